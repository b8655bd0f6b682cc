use codestream_rs::fields::{
    CodeResponse, FieldEvent, FieldHandler, FieldName, FieldStreamDecoder, ToolCall, ToolPosition,
};

const TWO_FILES: &str = r#"{"Text":"Two files.","Files":[{"FileName":"a.py","FileCode":"A = 1\n","tool_after_file":{"tool_name":"search","query":"x"}},{"FileName":"b.py","FileCode":"B = {2}\n"}],"Conclusion":"ok"}"#;

fn feed_in_pieces(input: &str, size: usize) -> (FieldStreamDecoder, Vec<FieldEvent>) {
    let mut decoder = FieldStreamDecoder::new();
    let mut events = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    for piece in chars.chunks(size) {
        let piece: String = piece.iter().collect();
        events.extend(decoder.process_chunk(&piece));
    }
    (decoder, events)
}

fn code_for(events: &[FieldEvent], index: usize) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            FieldEvent::FieldContent {
                field: FieldName::FileCode,
                file_index: Some(i),
                text,
            } if *i == index => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn file_started_fires_once_per_file_in_order() {
    for size in [1, 2, 5, 17, TWO_FILES.len()] {
        let (decoder, events) = feed_in_pieces(TWO_FILES, size);
        let started: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                FieldEvent::FileStarted { index } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(started, [0, 1], "chunk size {size}");
        assert_eq!(code_for(&events, 0), "A = 1\n");
        assert_eq!(code_for(&events, 1), "B = {2}\n");

        let response = decoder.response();
        assert_eq!(response.files.len(), 2);
        assert_eq!(response.files[0].code.as_deref(), Some("A = 1\n"));
        assert_eq!(response.files[1].name.as_deref(), Some("b.py"));
    }
}

#[test]
fn tool_call_between_files_is_isolated() {
    let (decoder, events) = feed_in_pieces(TWO_FILES, 3);

    let calls: Vec<&ToolCall> = events
        .iter()
        .filter_map(|event| match event {
            FieldEvent::ToolCall(call) => Some(call),
            _ => None,
        })
        .collect();
    assert_eq!(
        calls,
        [&ToolCall {
            position: ToolPosition::AfterFile,
            name: "search".into(),
            query: "x".into(),
            file_index: Some(0),
        }]
    );

    let leaked = events.iter().any(|event| match event {
        FieldEvent::FieldContent { text, .. } => text.contains("tool_name"),
        _ => false,
    });
    assert!(!leaked);
    assert_eq!(decoder.response().tool_calls.len(), 1);
}

#[test]
fn escapes_decode_at_every_boundary() {
    let input = r#"{"Text":"a\nb\tc\"d\\e"}"#;
    let expected = "a\nb\tc\"d\\e";
    for split in 1..input.len() {
        let mut decoder = FieldStreamDecoder::new();
        let mut events = decoder.process_chunk(&input[..split]);
        events.extend(decoder.process_chunk(&input[split..]));
        let text: String = events
            .iter()
            .filter_map(|event| match event {
                FieldEvent::FieldContent { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, expected, "split at {split}");
        assert_eq!(decoder.response().text.as_deref(), Some(expected));
    }
}

#[test]
fn empty_fragment_is_a_no_op() {
    let mut decoder = FieldStreamDecoder::new();
    decoder.process_chunk(r#"{"Text":"par"#);
    let before = decoder.snapshot();
    let consumed = decoder.consumed();

    assert!(decoder.process_chunk("").is_empty());
    assert!(decoder.process_chunk("").is_empty());
    assert_eq!(decoder.snapshot(), before);
    assert_eq!(decoder.consumed(), consumed);
}

#[test]
fn reset_allows_reuse_for_a_new_response() {
    let mut decoder = FieldStreamDecoder::new();
    decoder.process_chunk(TWO_FILES);
    assert!(decoder.response().complete);

    decoder.reset();
    assert_eq!(decoder.snapshot(), CodeResponse::default());
    assert_eq!(decoder.consumed(), 0);

    decoder.process_chunk(r#"{"Conclusion":"again"}"#);
    assert_eq!(decoder.response().conclusion.as_deref(), Some("again"));
    assert!(decoder.response().files.is_empty());
}

#[derive(Default)]
struct FileCodeCollector {
    files: Vec<String>,
    tools: usize,
    completed: bool,
}

impl FieldHandler for FileCodeCollector {
    fn on_file_start(&mut self, index: usize) {
        assert_eq!(index, self.files.len());
        self.files.push(String::new());
    }

    fn on_field_content(&mut self, field: FieldName, text: &str, file_index: Option<usize>) {
        if let (FieldName::FileCode, Some(i)) = (field, file_index) {
            self.files[i].push_str(text);
        }
    }

    fn on_tool_call(&mut self, _call: &ToolCall) {
        self.tools += 1;
    }

    fn on_complete(&mut self) {
        self.completed = true;
    }
}

#[test]
fn handler_hooks_receive_routed_events() {
    let mut decoder = FieldStreamDecoder::new();
    let mut collector = FileCodeCollector::default();
    for piece in TWO_FILES.as_bytes().chunks(7) {
        let piece = std::str::from_utf8(piece).unwrap();
        decoder.process_chunk_into(piece, &mut collector);
    }
    assert_eq!(collector.files, ["A = 1\n", "B = {2}\n"]);
    assert_eq!(collector.tools, 1);
    assert!(collector.completed);
}

#[test]
fn events_serialize_as_tagged_json() {
    let mut decoder = FieldStreamDecoder::new();
    let events = decoder.process_chunk(r#"{"Files":[{"FileName":"a"#);
    let json: Vec<serde_json::Value> = events
        .iter()
        .map(|event| serde_json::to_value(event).unwrap())
        .collect();
    assert_eq!(json[0], serde_json::json!({"event": "file_started", "index": 0}));
    assert_eq!(
        json[2],
        serde_json::json!({
            "event": "field_content",
            "field": "FileName",
            "file_index": 0,
            "text": "a"
        })
    );
}
