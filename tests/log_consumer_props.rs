use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Value, json};

use scriptrun::exec::{LogConsumer, parse_marker};
use scriptrun::types::StreamKind;

fn plain_line() -> impl Strategy<Value = String> {
    // Anything that cannot be mistaken for a marker.
    "[a-zA-Z0-9 _.,:=-]{0,40}".prop_filter("not a marker", |s| parse_marker(s).is_none())
}

proptest! {
    #[test]
    fn plain_lines_are_counted_and_never_become_outputs(
        lines in proptest::collection::vec((any::<bool>(), plain_line()), 0..200)
    ) {
        let consumer = LogConsumer::new();
        let mut expected_out = 0;
        let mut expected_err = 0;
        for (is_err, line) in &lines {
            if *is_err {
                expected_err += 1;
                consumer.accept(StreamKind::Stderr, line);
            } else {
                expected_out += 1;
                consumer.accept(StreamKind::Stdout, line);
            }
        }

        prop_assert_eq!(consumer.std_out_count(), expected_out);
        prop_assert_eq!(consumer.std_err_count(), expected_err);
        prop_assert!(consumer.outputs().is_empty());
    }

    #[test]
    fn last_marker_value_wins_per_key(
        writes in proptest::collection::vec(("[a-d]", any::<i64>()), 1..50)
    ) {
        let consumer = LogConsumer::new();
        let mut expected: HashMap<String, Value> = HashMap::new();
        for (key, value) in &writes {
            let line = format!("::{}::", json!({ "outputs": { key.as_str(): value } }));
            consumer.accept(StreamKind::Stdout, &line);
            expected.insert(key.clone(), json!(value));
        }

        prop_assert_eq!(consumer.outputs(), expected);
        prop_assert_eq!(consumer.std_out_count(), writes.len());
    }

    #[test]
    fn marker_grammar_tolerates_surrounding_whitespace(pad in "[ \t]{0,4}", n in any::<u32>()) {
        let line = format!("{pad}::{{\"outputs\":{{\"n\":{n}}}}}::{pad}");
        let outputs = parse_marker(&line).expect("marker should parse");
        prop_assert_eq!(&outputs["n"], &json!(n));
    }
}

#[test]
fn two_threads_share_one_consumer() {
    let consumer = Arc::new(LogConsumer::new());
    let handles: Vec<_> = [StreamKind::Stdout, StreamKind::Stderr]
        .into_iter()
        .map(|stream| {
            let consumer = Arc::clone(&consumer);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    consumer.accept(stream, &format!("::{{\"outputs\":{{\"{stream}\":{i}}}}}::"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(consumer.std_out_count(), 1000);
    assert_eq!(consumer.std_err_count(), 1000);
    let outputs = consumer.outputs();
    assert_eq!(outputs["stdout"], json!(999));
    assert_eq!(outputs["stderr"], json!(999));
}
