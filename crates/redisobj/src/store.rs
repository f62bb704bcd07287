use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use redisobj_client::{Command, Context, KvClient, Pipeline};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::digest::ContentHasher;
use crate::error::{Error, Result, SchemaError};
use crate::exec::{self, ReadBatch, WriteBatch};
use crate::gate::{DisabledGate, FreshnessGate, StoreGate};
use crate::key::{self, KeyLayout, Placement};
use crate::options::Options;
use crate::plan::RecordPlan;
use crate::record::Record;

type CompiledPlan = std::result::Result<Arc<dyn Any + Send + Sync>, SchemaError>;

/// Compiled plans keyed by record type name.
///
/// Each type gets one slot; the first caller compiles and every other caller
/// (concurrent or later) waits for and shares that result.
#[derive(Default)]
struct PlanCache {
    slots: RwLock<HashMap<&'static str, Arc<OnceLock<CompiledPlan>>>>,
    compilations: AtomicU64,
}

impl PlanCache {
    fn get<R: Record>(&self) -> Result<Arc<RecordPlan<R>>> {
        let existing = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(R::TYPE_NAME)
            .cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => Arc::clone(
                self.slots
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(R::TYPE_NAME)
                    .or_default(),
            ),
        };

        let compiled = slot.get_or_init(|| {
            self.compilations.fetch_add(1, Ordering::Relaxed);
            let plan = RecordPlan::<R>::compile();
            match &plan {
                Ok(plan) => debug!(
                    type_name = R::TYPE_NAME,
                    fields = plan.field_count(),
                    "compiled record plan"
                ),
                Err(err) => warn!(type_name = R::TYPE_NAME, error = %err, "record plan rejected"),
            }
            plan.map(|plan| Arc::new(plan) as Arc<dyn Any + Send + Sync>)
        });

        match compiled {
            Ok(plan) => Arc::clone(plan).downcast::<RecordPlan<R>>().map_err(|_| {
                Error::InvalidObject(format!(
                    "type name {} is used by more than one record type",
                    R::TYPE_NAME
                ))
            }),
            Err(err) => Err(Error::InvalidSchema(err.clone())),
        }
    }

    fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Maps records onto a key-value store.
///
/// A `Store` is cheap to share: it holds the client, the configuration and
/// a cache of compiled plans. All methods take `&self` and may be called
/// concurrently.
///
/// ```
/// use redisobj::{Options, Record, Schema, Store};
/// use redisobj_client::{Context, InMemoryClient};
///
/// #[derive(Default)]
/// struct Counter {
///     name: String,
///     value: i64,
/// }
///
/// impl Record for Counter {
///     const TYPE_NAME: &'static str = "Counter";
///
///     fn schema(schema: &mut Schema<Self>) {
///         schema
///             .key("Name", |c| &c.name, |c| &mut c.name)
///             .scalar("Value", |c| &c.value, |c| &mut c.value);
///     }
/// }
///
/// let store = Store::new(InMemoryClient::new());
/// let ctx = Context::background();
/// let counter = Counter { name: "hits".into(), value: 3 };
/// store.write(&ctx, &counter, &Options::default()).unwrap();
///
/// let mut loaded = Counter { name: "hits".into(), ..Default::default() };
/// store.read(&ctx, &mut loaded, &Options::default()).unwrap();
/// assert_eq!(loaded.value, 3);
/// ```
pub struct Store<C> {
    client: C,
    config: StoreConfig,
    hasher: ContentHasher,
    plans: PlanCache,
}

impl<C: KvClient> Store<C> {
    /// A store with the default configuration.
    pub fn new(client: C) -> Self {
        let config = StoreConfig::default();
        let hasher = ContentHasher::new(config.digest_domain.clone());
        Self {
            client,
            config,
            hasher,
            plans: PlanCache::default(),
        }
    }

    /// A store with an explicit configuration.
    pub fn with_config(client: C, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        info!(
            root_prefix = %config.root_prefix,
            default_ttl = ?config.default_ttl,
            "store configured"
        );
        Ok(Self {
            client,
            hasher: ContentHasher::new(config.digest_domain.clone()),
            config,
            plans: PlanCache::default(),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The compiled plan for `R`, compiling it on first use.
    pub fn plan<R: Record>(&self) -> Result<Arc<RecordPlan<R>>> {
        self.plans.get::<R>()
    }

    /// Number of record types with a cached plan (or cached compile error).
    pub fn cached_plans(&self) -> usize {
        self.plans.len()
    }

    /// Number of plan compilations performed so far.
    pub fn plan_compilations(&self) -> u64 {
        self.plans.compilations.load(Ordering::Relaxed)
    }

    /// Persist `obj` and everything nested in it.
    ///
    /// All field writes go out in one pipelined round trip. With caching
    /// enabled, each boundary record first costs one freshness round trip,
    /// and records whose digest is unchanged skip their field writes. When
    /// the pipeline fails, the freshness keys published by this call are
    /// deleted on a best-effort basis.
    pub fn write<R: Record>(&self, ctx: &Context, obj: &R, options: &Options) -> Result<()> {
        let plan = self.plan::<R>()?;
        let ttl = options.effective_ttl(self.config.default_ttl);

        let store_gate;
        let gate: &dyn FreshnessGate = if options.enable_caching {
            store_gate = StoreGate::new(&self.client, ctx);
            &store_gate
        } else {
            &DisabledGate
        };

        let mut batch = WriteBatch::new(&self.config.root_prefix, ttl, gate, &self.hasher);
        exec::write_record(&plan, obj, Placement::Root, false, &mut batch)?;

        let WriteBatch {
            pipeline,
            published,
            boundaries,
            fresh,
            ..
        } = batch;
        let commands = pipeline.len();

        let outcome = pipeline
            .exec(&self.client, ctx)
            .map_err(Error::from)
            .and_then(|replies| {
                replies
                    .into_iter()
                    .try_for_each(|reply| reply.map(drop))
                    .map_err(Error::from)
            });
        if let Err(err) = outcome {
            self.invalidate(ctx, published);
            return Err(err);
        }

        debug!(
            type_name = R::TYPE_NAME,
            commands,
            boundaries,
            fresh,
            ttl = ?ttl,
            "record written"
        );
        Ok(())
    }

    /// Load `obj` and everything nested in it.
    ///
    /// Identity fields of keyed records (the root and any keyed nested
    /// records) must be set before the call; they select the keys to read.
    /// Every other field is overwritten. If a keyed record has no stored
    /// identity, the remaining fields are still applied and
    /// [`Error::ObjectNotFound`] is returned.
    ///
    /// With caching enabled, boundary records whose stored digest matches
    /// the destination's current contents are not read.
    pub fn read<R: Record>(&self, ctx: &Context, obj: &mut R, options: &Options) -> Result<()> {
        let plan = self.plan::<R>()?;

        let store_gate;
        let gate: &dyn FreshnessGate = if options.enable_caching {
            store_gate = StoreGate::new(&self.client, ctx);
            &store_gate
        } else {
            &DisabledGate
        };

        let mut batch = ReadBatch::new(&self.config.root_prefix, gate, &self.hasher);
        let emission = exec::read_record(&plan, obj, Placement::Root, false, &mut batch)?;
        let (boundaries, fresh) = (batch.boundaries, batch.fresh);

        let (commands, consumers) = emission.into_parts();
        let count = commands.len();
        let replies = Pipeline::from_iter(commands).exec(&self.client, ctx)?;
        exec::resolve(obj, consumers, replies)?;

        debug!(
            type_name = R::TYPE_NAME,
            commands = count,
            boundaries,
            fresh,
            "record read"
        );
        Ok(())
    }

    /// Delete every key `obj` maps to, including keyed nested records and
    /// freshness keys, in one round trip.
    pub fn delete<R: Record>(&self, ctx: &Context, obj: &R) -> Result<()> {
        let layout = self.keys_of(obj)?;
        let keys: Vec<String> = layout.keys().map(str::to_string).collect();
        let removed = self
            .client
            .execute_one(ctx, Command::Del { keys })?;
        debug!(type_name = R::TYPE_NAME, keys = layout.len(), ?removed, "record deleted");
        Ok(())
    }

    /// Every key `obj` maps to, without touching the store.
    pub fn keys_of<R: Record>(&self, obj: &R) -> Result<KeyLayout> {
        let plan = self.plan::<R>()?;
        let mut layout = KeyLayout::default();
        key::layout_record(&plan, obj, Placement::Root, &self.config.root_prefix, &mut layout);
        Ok(layout)
    }

    fn invalidate(&self, ctx: &Context, published: Vec<String>) {
        if published.is_empty() {
            return;
        }
        let count = published.len();
        match self
            .client
            .execute_one(ctx, Command::Del { keys: published })
        {
            Ok(_) => debug!(count, "invalidated freshness keys after failed write"),
            Err(err) => warn!(count, error = %err, "could not invalidate freshness keys"),
        }
    }
}

impl<C> fmt::Debug for Store<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("cached_plans", &self.plans.len())
            .finish()
    }
}
