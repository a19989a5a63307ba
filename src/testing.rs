//! Test fixtures and a scripted in-memory [`DiscussionApi`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;

use crate::api::DiscussionApi;
use crate::cache::Endpoint;
use crate::errors::ClientError;
use crate::models::{
    Author, BestPractice, ListingPage, ModerationDecision, NewPost, NewReply, Pagination, Post,
    PostThread, QueryArgs, Reply, UpdatePostRequest, VoteResponse, VoteTally, VoteType,
};

pub fn author(id: &str) -> Author {
    Author {
        id: id.to_string(),
        name: format!("Farmer {}", id),
        avatar: None,
        level: Some("Sprout".to_string()),
        points: 10,
        location: Some("Nashik".to_string()),
    }
}

pub fn post(id: &str, upvotes: u32, downvotes: u32) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Post {}", id),
        content: "Which fertilizer works best for onions?".to_string(),
        author: author("author-1"),
        tags: Vec::new(),
        votes: VoteTally::new(upvotes, downvotes),
        reply_count: 0,
        images: Vec::new(),
        video: None,
        is_market_post: false,
        is_available: false,
        is_approved: true,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        last_vote_event_at: None,
    }
}

pub fn reply(id: &str, upvotes: u32, downvotes: u32) -> Reply {
    Reply {
        id: id.to_string(),
        content: format!("Reply {}", id),
        author: author("author-2"),
        votes: VoteTally::new(upvotes, downvotes),
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        replies: Vec::new(),
    }
}

pub fn practice(id: &str) -> BestPractice {
    BestPractice {
        id: id.to_string(),
        title: format!("Practice {}", id),
        content: "Rotate crops every season".to_string(),
        category: Some("soil".to_string()),
        image: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
    }
}

pub fn page<T>(items: Vec<T>, next_cursor: Option<&str>) -> ListingPage<T> {
    ListingPage::new(
        items,
        Pagination {
            has_next_page: next_cursor.is_some(),
            next_cursor: next_cursor.map(str::to_string),
            count: None,
        },
    )
}

pub fn thread(post_id: &str, replies: Vec<Reply>) -> PostThread {
    PostThread {
        post: post(post_id, 0, 0),
        replies,
    }
}

type Scripted<T> = VecDeque<Result<T, ClientError>>;

#[derive(Default)]
struct Script {
    posts: HashMap<(Endpoint, String), Scripted<ListingPage<Post>>>,
    practices: HashMap<String, Scripted<ListingPage<BestPractice>>>,
    threads: HashMap<String, Scripted<PostThread>>,
    mutation_error: Option<ClientError>,
    calls: Vec<String>,
}

/// Pops the next scripted result; the last one is replayed forever.
fn next_scripted<T: Clone>(queue: Option<&mut Scripted<T>>, what: &str) -> Result<T, ClientError> {
    let Some(queue) = queue else {
        return Err(ClientError::Api {
            status: 404,
            message: format!("no script for {}", what),
            details: None,
        });
    };
    if queue.len() > 1 {
        return queue.pop_front().unwrap();
    }
    queue.front().cloned().unwrap_or_else(|| {
        Err(ClientError::Api {
            status: 404,
            message: format!("empty script for {}", what),
            details: None,
        })
    })
}

/// In-memory API answering from scripted responses and logging every call.
pub struct ScriptedApi {
    script: Mutex<Script>,
    gate: Arc<Semaphore>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            gate: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
        }
    }
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutations block until [`ScriptedApi::release`] is called.
    pub fn held() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn push_posts(
        &self,
        endpoint: Endpoint,
        cursor: &str,
        result: Result<ListingPage<Post>, ClientError>,
    ) {
        let mut script = self.script.lock().unwrap();
        script
            .posts
            .entry((endpoint, cursor.to_string()))
            .or_default()
            .push_back(result);
    }

    pub fn push_practices(&self, cursor: &str, result: Result<ListingPage<BestPractice>, ClientError>) {
        let mut script = self.script.lock().unwrap();
        script
            .practices
            .entry(cursor.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn push_thread(&self, post_id: &str, result: Result<PostThread, ClientError>) {
        let mut script = self.script.lock().unwrap();
        script
            .threads
            .entry(post_id.to_string())
            .or_default()
            .push_back(result);
    }

    /// Replace every queued response of a listing cursor.
    pub fn reset_posts(&self, endpoint: Endpoint, cursor: &str, result: Result<ListingPage<Post>, ClientError>) {
        let mut script = self.script.lock().unwrap();
        script
            .posts
            .insert((endpoint, cursor.to_string()), VecDeque::from([result]));
    }

    pub fn fail_mutations(&self, error: Option<ClientError>) {
        self.script.lock().unwrap().mutation_error = error;
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.script.lock().unwrap().calls.push(call);
    }

    async fn mutation(&self, call: String) -> Result<(), ClientError> {
        self.log(call);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ClientError::Transport("gate closed".into()))?;
        match self.script.lock().unwrap().mutation_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DiscussionApi for ScriptedApi {
    async fn list_posts(
        &self,
        endpoint: Endpoint,
        args: &QueryArgs,
    ) -> Result<ListingPage<Post>, ClientError> {
        self.log(format!("{} cursor={}", endpoint.name(), args.cursor));
        tokio::task::yield_now().await;
        let mut script = self.script.lock().unwrap();
        next_scripted(
            script.posts.get_mut(&(endpoint, args.cursor.clone())),
            endpoint.name(),
        )
    }

    async fn list_best_practices(
        &self,
        args: &QueryArgs,
    ) -> Result<ListingPage<BestPractice>, ClientError> {
        self.log(format!("getBestPractices cursor={}", args.cursor));
        let mut script = self.script.lock().unwrap();
        next_scripted(script.practices.get_mut(&args.cursor), "getBestPractices")
    }

    async fn get_thread(&self, post_id: &str) -> Result<PostThread, ClientError> {
        self.log(format!("getPostThread {}", post_id));
        let mut script = self.script.lock().unwrap();
        next_scripted(script.threads.get_mut(post_id), "getPostThread")
    }

    async fn vote_post(&self, post_id: &str, vote: VoteType) -> Result<VoteResponse, ClientError> {
        self.mutation(format!("votePost {} {}", post_id, vote.as_str()))
            .await?;
        Ok(VoteResponse {
            upvotes: 0,
            downvotes: 0,
            user_vote: Some(vote),
        })
    }

    async fn vote_reply(
        &self,
        reply_id: &str,
        vote: VoteType,
    ) -> Result<VoteResponse, ClientError> {
        self.mutation(format!("voteReply {} {}", reply_id, vote.as_str()))
            .await?;
        Ok(VoteResponse {
            upvotes: 0,
            downvotes: 0,
            user_vote: Some(vote),
        })
    }

    async fn create_post(&self, new_post: &NewPost) -> Result<Post, ClientError> {
        self.mutation(format!("createPost {}", new_post.title)).await?;
        let mut created = post("created", 0, 0);
        created.title = new_post.title.clone();
        Ok(created)
    }

    async fn update_post(
        &self,
        post_id: &str,
        _update: &UpdatePostRequest,
    ) -> Result<(), ClientError> {
        self.mutation(format!("updatePost {}", post_id)).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), ClientError> {
        self.mutation(format!("deletePost {}", post_id)).await
    }

    async fn create_reply(&self, post_id: &str, new_reply: &NewReply) -> Result<Reply, ClientError> {
        self.mutation(format!("createReply {}", post_id)).await?;
        let mut created = reply("new-reply", 0, 0);
        created.content = new_reply.content.clone();
        Ok(created)
    }

    async fn moderate_post(
        &self,
        post_id: &str,
        decision: ModerationDecision,
    ) -> Result<(), ClientError> {
        self.mutation(format!("moderatePost {} {}", post_id, decision.as_path()))
            .await
    }
}
