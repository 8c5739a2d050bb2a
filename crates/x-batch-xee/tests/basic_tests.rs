//! x-batch processors running on the xee engine

use std::sync::Arc;

use x_batch::{
    EvaluateTask, FilterTask, LocalExecutor, NamespaceMappings, OutputMethod, Record, WorkerContext, XPathProcessor,
    XQueryProcessor, ERROR_MARKER,
};
use x_batch_xee::XeeEngine;

fn context() -> WorkerContext {
    WorkerContext::builder(Arc::new(XeeEngine::new())).build()
}

fn ns(pairs: &[(&str, &str)]) -> NamespaceMappings {
    pairs.iter().map(|(p, u)| (p.to_string(), u.to_string())).collect()
}

#[test]
fn test_filter_matches_only_joe() {
    let ctx = context();
    let mut processor = XPathProcessor::compile("/name[.='joe']", &ctx).unwrap();
    assert!(processor.filter("<name>joe</name>").unwrap());
    assert!(!processor.filter("<name>jim</name>").unwrap());
}

#[test]
fn test_evaluate_with_namespace_map() {
    let ctx = context();
    let mut processor = XPathProcessor::new("/a:name")
        .with_namespaces(ns(&[("a", "ns1")]))
        .activated(&ctx)
        .unwrap();
    assert_eq!(
        processor.evaluate("<name xmlns='ns1'>john</name>").unwrap(),
        "<name xmlns=\"ns1\">john</name>"
    );
    assert_eq!(processor.evaluate("<name xmlns='ns2'>john</name>").unwrap(), "");
}

#[test]
fn test_worker_namespace_table_feeds_compilation() {
    let ctx = context();
    ctx.namespaces().init(ns(&[("a", "ns1")]));
    let mut processor = XPathProcessor::compile("count(/a:name)", &ctx).unwrap();
    assert_eq!(processor.evaluate("<name xmlns='ns1'>john</name>").unwrap(), "1");
}

#[test]
fn test_atomic_results_are_escaped_and_text_output_is_raw() {
    let ctx = context();
    let mut processor = XPathProcessor::compile("concat(/a, ' < ', /b)", &ctx).unwrap();
    assert_eq!(processor.evaluate("<r><a>1</a><b>2</b></r>").unwrap(), "1 &lt; 2");

    let mut processor = XPathProcessor::new("/r/*")
        .with_output_method(OutputMethod::Text)
        .activated(&ctx)
        .unwrap();
    assert_eq!(processor.evaluate("<r><a>1</a><b>2</b></r>").unwrap(), "12");
}

#[test]
fn test_compile_and_parse_failures() {
    let ctx = context();
    assert!(XPathProcessor::compile("/name[", &ctx).is_err());
    assert!(XPathProcessor::compile("/undeclared:name", &ctx).is_err());
    assert!(XQueryProcessor::compile("count(//item)", &ctx).is_err());

    let mut processor = XPathProcessor::compile("/name", &ctx).unwrap();
    assert!(processor.evaluate("not xml").is_err());
    assert_eq!(processor.evaluate("<name>joe</name>").unwrap(), "<name>joe</name>");
}

#[test]
fn test_batch_runs_one_engine_handle_per_partition() {
    let executor = LocalExecutor::new(context(), 2);
    let records: Vec<Record> = ["<name>joe</name>", "<name>jim</name>", "broken", "<name>joe</name>"]
        .into_iter()
        .map(Record::from)
        .collect();

    let filter = FilterTask(XPathProcessor::new("/name[.='joe']"));
    assert_eq!(executor.run(&filter, &records).unwrap(), vec![true, false, false, true]);

    let evaluate = EvaluateTask(XPathProcessor::new("string(/name)"));
    assert_eq!(
        executor.run(&evaluate, &records).unwrap(),
        vec!["joe", "jim", ERROR_MARKER, "joe"]
    );
}
