//! # Example: audit_pipeline
//!
//! Demonstrates a save/find round through the lifecycle checkpoints.
//!
//! Shows how to:
//! - Declare a capability ([`Audited`]) in the [`TypeHierarchy`] with [`upcast!`].
//! - Register an audit transform, a validation veto and a document stamp.
//! - Attach a custom [`Listen`] implementation to count checkpoint events.
//! - Resolve a cross-reference (`Post.author_id` → `users`) on load.
//!
//! ## Flow
//! ```text
//! Template::save(users, User)
//!     ├─► BeforeConvert: require-name (User) ─► audit (dyn Audited)
//!     ├─► JsonCodec::encode
//!     ├─► BeforeSave:   stamp-collection (universal)
//!     ├─► MemoryStore::write
//!     └─► AfterSave ──► EventBus ──► PhaseCounter.on_event()
//! Template::find_by_id(posts, p-1)
//!     ├─► AfterLoad(posts) ─► decode ─► AfterLoad(users) ─► AfterConvert(users) ─► attach
//!     └─► AfterConvert(posts)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=hookvisor=debug cargo run --example audit_pipeline --features logging
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hookvisor::{
    upcast, CallContext, Callback, CallbackError, Config, Entity, EntityType, JsonCodec, Lifecycle,
    LifecycleEvent, Listen, MemoryStore, NotifyFn, Phase, Snapshot, Template, Transform,
    TransformFn, TypeHierarchy,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Anything that carries a "last modified by" stamp.
trait Audited: Send + Sync + 'static {
    fn touch(&mut self, by: &str);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    modified_by: Option<String>,
}

impl Entity for User {}

#[derive(Debug, Serialize, Deserialize)]
struct Post {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    author_id: String,
    modified_by: Option<String>,
    #[serde(skip)]
    author: Option<User>,
}

impl Entity for Post {}

impl Audited for User {
    fn touch(&mut self, by: &str) {
        self.modified_by = Some(by.to_string());
    }
}

impl Audited for Post {
    fn touch(&mut self, by: &str) {
        self.modified_by = Some(by.to_string());
    }
}

/// Writes the target collection into every outgoing document.
struct StampCollection;

#[async_trait]
impl Transform for StampCollection {
    fn name(&self) -> &str {
        "stamp-collection"
    }

    async fn transform(
        &self,
        mut snapshot: Snapshot,
        ctx: &CallContext,
    ) -> Result<Snapshot, CallbackError> {
        if let Some(doc) = snapshot.document_mut() {
            doc.insert("_collection".into(), ctx.collection().into());
        }
        Ok(snapshot)
    }
}

/// Counts events per phase.
#[derive(Default)]
struct PhaseCounter {
    seen: Mutex<BTreeMap<&'static str, usize>>,
}

#[async_trait]
impl Listen for PhaseCounter {
    async fn on_event(&self, ev: &LifecycleEvent) -> Result<(), CallbackError> {
        let mut seen = self.seen.lock().map_err(CallbackError::fail)?;
        *seen.entry(ev.phase.as_label()).or_default() += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "phase-counter"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut types = TypeHierarchy::new();
    types.declare::<User>().extends(upcast!(User => dyn Audited))?;
    types.declare::<Post>().extends(upcast!(Post => dyn Audited))?;

    let counter = Arc::new(PhaseCounter::default());

    let builder = Lifecycle::builder(Config::default())
        .with_types(types)
        .with_transform(
            Phase::BeforeConvert,
            0,
            TransformFn::<dyn Audited, _>::capability("audit", |a, _ctx| {
                a.touch("demo");
                Ok(())
            }),
        )
        .with_notify(
            Phase::BeforeConvert,
            10,
            NotifyFn::exact("require-name", |u: &User, _ctx: &CallContext| {
                if u.name.trim().is_empty() {
                    return Err(CallbackError::veto("user name is empty"));
                }
                Ok(())
            }),
        )
        .with_callback(
            Phase::BeforeSave,
            EntityType::any(),
            0,
            Callback::transforming(StampCollection),
        )
        .with_listener(counter.clone());

    #[cfg(feature = "logging")]
    let builder = builder.with_listener(Arc::new(hookvisor::LogWriter));

    let lifecycle = Arc::new(builder.build()?);

    let codec = JsonCodec::new()
        .with_type::<User>()
        .with_type::<Post>()
        .with_reference::<Post, User>("author_id", "users", |p, u| p.author = Some(u))?;
    let template = Template::new(Arc::clone(&lifecycle), codec, MemoryStore::new());

    let ada = template
        .save(
            "users",
            User {
                id: "u-1".into(),
                name: "Ada".into(),
                modified_by: None,
            },
        )
        .await?;
    println!("[demo] saved user: {ada:?}");

    match template
        .save(
            "users",
            User {
                id: "u-2".into(),
                name: "   ".into(),
                modified_by: None,
            },
        )
        .await
    {
        Ok(u) => println!("[demo] unexpectedly saved: {u:?}"),
        Err(e) => println!("[demo] rejected: {e}"),
    }

    template
        .save(
            "posts",
            Post {
                id: "p-1".into(),
                title: "Notes on the engine".into(),
                author_id: "u-1".into(),
                modified_by: None,
                author: None,
            },
        )
        .await?;

    let post: Option<Post> = template.find_by_id("posts", "p-1").await?;
    if let Some(post) = post {
        println!(
            "[demo] loaded post {:?} by {:?} (modified by {:?})",
            post.title,
            post.author.as_ref().map(|u| u.name.as_str()),
            post.modified_by
        );
    }

    lifecycle.shutdown().await;

    let seen = counter.seen.lock().map_err(|e| anyhow::anyhow!("{e}"))?;
    for (phase, n) in seen.iter() {
        println!("[demo] {phase:<14} events={n}");
    }
    Ok(())
}
