//! Batch dispatch adapters.
//!
//! An execution framework drives a worker in two steps: an init once per
//! partition before the first record, then a call per record. The
//! per-record call never fails. Errors are logged and replaced by the
//! task's error marker so one bad document does not abort the batch.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::error::{Error, Result};
use crate::output::OutputMethod;
use crate::processor::{XPathProcessor, XQueryProcessor, XsltProcessor};
use crate::store::ObjectLocation;

/// Returned by string-valued tasks in place of a failed result
pub const ERROR_MARKER: &str = "<error/>";

/// One-time worker initialization run at the start of each partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInit {
    /// Clear the store client, namespace table and caches first
    #[serde(default)]
    pub reset: bool,
    /// Namespace table to load into the registry
    #[serde(default)]
    pub namespace_source: Option<ObjectLocation>,
}

impl WorkerInit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Init that loads the namespace table named by `config`
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            reset: false,
            namespace_source: config.namespaces.clone(),
        }
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn with_namespace_source(mut self, location: ObjectLocation) -> Self {
        self.namespace_source = Some(location);
        self
    }

    pub fn run(&self, ctx: &WorkerContext) -> Result<()> {
        if self.reset {
            ctx.clear();
        }
        ctx.store().init();
        if let Some(location) = &self.namespace_source {
            ctx.namespaces()
                .init_from_store(ctx.store(), &location.bucket, &location.key)?;
        }
        Ok(())
    }
}

/// Input of a per-record call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Record {
    /// Document text carried with the record
    Inline(String),
    /// Document held in the object store
    Stored(ObjectLocation),
}

impl Record {
    fn document(&self, ctx: &WorkerContext) -> Result<Cow<'_, str>> {
        match self {
            Record::Inline(text) => Ok(Cow::Borrowed(text)),
            Record::Stored(location) => Ok(Cow::Owned(ctx.store().get(&location.bucket, &location.key)?)),
        }
    }
}

impl From<&str> for Record {
    fn from(text: &str) -> Self {
        Record::Inline(text.to_string())
    }
}

impl From<String> for Record {
    fn from(text: String) -> Self {
        Record::Inline(text)
    }
}

impl From<ObjectLocation> for Record {
    fn from(location: ObjectLocation) -> Self {
        Record::Stored(location)
    }
}

/// A serializable per-record function shipped to workers.
///
/// Tasks travel as JSON and are rehydrated on the thread that runs them,
/// so only their output has to cross threads.
pub trait RecordTask: Serialize + DeserializeOwned {
    type Output: Send;

    /// Rebuild process-local state; runs once per partition
    fn activate(&mut self, ctx: &WorkerContext) -> Result<()>;

    fn call(&mut self, ctx: &WorkerContext, document: &str) -> Result<Self::Output>;

    /// Value returned in place of a failed call
    fn error_marker(&self) -> Self::Output;
}

/// XPath filter: does the expression select anything in the record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterTask(pub XPathProcessor);

impl RecordTask for FilterTask {
    type Output = bool;

    fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        self.0.activate(ctx)
    }

    fn call(&mut self, _ctx: &WorkerContext, document: &str) -> Result<bool> {
        self.0.filter(document)
    }

    fn error_marker(&self) -> bool {
        false
    }
}

/// Processors with a string-valued `evaluate`
pub trait Evaluator {
    fn activate(&mut self, ctx: &WorkerContext) -> Result<()>;
    fn evaluate(&mut self, xml: &str) -> Result<String>;
}

impl Evaluator for XPathProcessor {
    fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        XPathProcessor::activate(self, ctx)
    }

    fn evaluate(&mut self, xml: &str) -> Result<String> {
        XPathProcessor::evaluate(self, xml)
    }
}

impl Evaluator for XQueryProcessor {
    fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        XQueryProcessor::activate(self, ctx)
    }

    fn evaluate(&mut self, xml: &str) -> Result<String> {
        XQueryProcessor::evaluate(self, xml)
    }
}

/// XPath or XQuery evaluation of each record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateTask<P>(pub P);

impl<P> RecordTask for EvaluateTask<P>
where
    P: Evaluator + Serialize + DeserializeOwned,
{
    type Output = String;

    fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        self.0.activate(ctx)
    }

    fn call(&mut self, _ctx: &WorkerContext, document: &str) -> Result<String> {
        self.0.evaluate(document)
    }

    fn error_marker(&self) -> String {
        ERROR_MARKER.to_string()
    }
}

/// XSLT transform of each record with fixed parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformTask {
    pub processor: XsltProcessor,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl TransformTask {
    pub fn new(processor: XsltProcessor) -> Self {
        Self {
            processor,
            params: BTreeMap::new(),
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }
}

impl RecordTask for TransformTask {
    type Output = String;

    fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        self.processor.activate(ctx)
    }

    fn call(&mut self, _ctx: &WorkerContext, document: &str) -> Result<String> {
        self.processor.transform_with_params(document, &self.params)
    }

    fn error_marker(&self) -> String {
        ERROR_MARKER.to_string()
    }
}

/// XSLT transform with a stylesheet held in the object store.
///
/// Only the stylesheet location ships; the text is fetched through the
/// worker's stylesheet cache and compiled once per partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredStylesheetTask {
    pub stylesheet: ObjectLocation,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub output_method: OutputMethod,
    #[serde(skip)]
    processor: Option<XsltProcessor>,
}

impl StoredStylesheetTask {
    pub fn new(stylesheet: ObjectLocation) -> Self {
        Self {
            stylesheet,
            params: BTreeMap::new(),
            output_method: OutputMethod::default(),
            processor: None,
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_output_method(mut self, method: OutputMethod) -> Self {
        self.output_method = method;
        self
    }
}

impl RecordTask for StoredStylesheetTask {
    type Output = String;

    fn activate(&mut self, ctx: &WorkerContext) -> Result<()> {
        let text = ctx.stylesheet(&self.stylesheet.bucket, &self.stylesheet.key)?;
        let processor = XsltProcessor::new(text.to_string())
            .with_output_method(self.output_method)
            .activated(ctx)?;
        self.processor = Some(processor);
        Ok(())
    }

    fn call(&mut self, _ctx: &WorkerContext, document: &str) -> Result<String> {
        let processor = self
            .processor
            .as_mut()
            .ok_or_else(|| Error::NotActivated(self.stylesheet.to_string()))?;
        processor.transform_with_params(document, &self.params)
    }

    fn error_marker(&self) -> String {
        ERROR_MARKER.to_string()
    }
}

/// Drives one task over the records of a partition
pub struct PartitionAdapter<T: RecordTask> {
    ctx: WorkerContext,
    task: T,
    ready: bool,
}

impl<T: RecordTask> PartitionAdapter<T> {
    /// Run `init`, then activate `task`.
    ///
    /// A failure is logged and leaves the adapter unready; every record of
    /// the partition then yields the error marker.
    pub fn open(ctx: WorkerContext, init: &WorkerInit, mut task: T) -> Self {
        let ready = match init.run(&ctx).and_then(|()| task.activate(&ctx)) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "partition init failed, records will be marked as errors");
                false
            }
        };
        Self { ctx, task, ready }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Process one record; never fails
    pub fn call(&mut self, record: &Record) -> T::Output {
        if !self.ready {
            return self.task.error_marker();
        }
        let result = record
            .document(&self.ctx)
            .and_then(|document| self.task.call(&self.ctx, &document));
        match result {
            Ok(output) => output,
            Err(err) => {
                error!(error = %err, "record failed");
                self.task.error_marker()
            }
        }
    }
}

/// Runs a task over records on local threads, one per partition.
///
/// The task is shipped to every partition as a JSON snapshot and
/// rehydrated there, exactly as a cluster would ship it to remote
/// workers. Results come back in input order.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    ctx: WorkerContext,
    partitions: usize,
    init: WorkerInit,
}

impl LocalExecutor {
    pub fn new(ctx: WorkerContext, partitions: usize) -> Self {
        Self {
            ctx,
            partitions: partitions.max(1),
            init: WorkerInit::default(),
        }
    }

    /// Executor sized and initialized from a worker configuration
    pub fn from_config(ctx: WorkerContext, config: &WorkerConfig) -> Self {
        Self::new(ctx, config.partitions).with_init(WorkerInit::from_config(config))
    }

    pub fn with_init(mut self, init: WorkerInit) -> Self {
        self.init = init;
        self
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn init(&self) -> &WorkerInit {
        &self.init
    }

    pub fn run<T: RecordTask>(&self, task: &T, records: &[Record]) -> Result<Vec<T::Output>> {
        let snapshot = serde_json::to_string(task)?;
        // partitions share one context, so reset once rather than per partition
        if self.init.reset {
            self.ctx.clear();
        }
        let partition_init = WorkerInit {
            reset: false,
            namespace_source: self.init.namespace_source.clone(),
        };
        let chunk_size = records.len().div_ceil(self.partitions).max(1);
        info!(
            records = records.len(),
            partitions = self.partitions,
            "dispatching batch"
        );

        std::thread::scope(|scope| {
            let handles: Vec<_> = records
                .chunks(chunk_size)
                .enumerate()
                .map(|(index, chunk)| {
                    let snapshot = snapshot.as_str();
                    let partition_init = &partition_init;
                    let ctx = self.ctx.clone();
                    scope.spawn(move || -> Result<Vec<T::Output>> {
                        let task: T = serde_json::from_str(snapshot)?;
                        let mut adapter = PartitionAdapter::open(ctx, partition_init, task);
                        debug!(partition = index, records = chunk.len(), "partition started");
                        Ok(chunk.iter().map(|record| adapter.call(record)).collect())
                    })
                })
                .collect();

            let mut results = Vec::with_capacity(records.len());
            for (index, handle) in handles.into_iter().enumerate() {
                let outputs = handle.join().map_err(|_| Error::Partition {
                    index,
                    message: "worker thread panicked".to_string(),
                })??;
                results.extend(outputs);
            }
            Ok(results)
        })
    }
}
