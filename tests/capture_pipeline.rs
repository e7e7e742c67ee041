use layout_inspector::files::{read_snapshot_file, save_to_file};
use layout_inspector::snapshot;
use layout_inspector::{
    capture_view, CaptureError, CaptureOptions, DumpWriter, ForcedState, NodeId, ProtocolVersion,
    RemoteWindow, ViewTree,
};
use std::time::Duration;
use tempfile::tempdir;

const PREVIEW: &[u8] = &[0x89, b'P', b'N', b'G'];

struct ScriptedWindow {
    dump: Vec<u8>,
    stall: Duration,
}

impl RemoteWindow for ScriptedWindow {
    fn title(&self) -> &str {
        "com.example/.MainActivity"
    }

    fn load_window_data(
        &self,
        _options: &CaptureOptions,
        timeout: Duration,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        if self.stall > timeout {
            return Ok(None);
        }
        Ok(Some(self.dump.clone()))
    }

    fn load_view_image(
        &self,
        _tree: &ViewTree,
        _node: NodeId,
        _timeout: Duration,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(Some(PREVIEW.to_vec()))
    }
}

fn dump(version: ProtocolVersion) -> Vec<u8> {
    let geometry = [
        ("layout:mLeft", "0"),
        ("layout:mTop", "0"),
        ("layout:getWidth()", "1080"),
        ("layout:getHeight()", "1920"),
        ("getVisibility()", "VISIBLE"),
        ("drawing:willNotDraw()", "false"),
    ];
    let mut writer = DumpWriter::new(version);
    writer
        .record(0, "root", "abc", &geometry)
        .record(1, "child", "def", &geometry);
    writer.finish()
}

#[test]
fn capture_round_trips_through_snapshot() {
    let options = CaptureOptions::for_api_level("com.example/.MainActivity", 23);
    assert_eq!(options.version, ProtocolVersion::V2);

    let window = ScriptedWindow {
        dump: dump(options.version),
        stall: Duration::ZERO,
    };
    let result = capture_view(&window, &options);
    assert!(result.is_success(), "{}", result.error());

    let decoded = snapshot::decode(result.data().unwrap()).unwrap();
    assert_eq!(decoded.options, options.to_string());
    assert_eq!(decoded.hierarchy, dump(ProtocolVersion::V2));
    assert_eq!(decoded.preview, PREVIEW);
    assert_eq!(decoded.capture_options(), Some(options));

    let tree = decoded.parse_tree().unwrap().unwrap();
    let root = tree.root();
    assert_eq!(tree.node(root).to_string(), "root@abc");
    assert_eq!(tree.node(root).children().len(), 1);
    let child = tree.node(root).children()[0];
    assert_eq!(tree.node(child).to_string(), "child@def");
    assert_eq!(tree.node(child).parent(), Some(root));
}

#[test]
fn old_devices_use_the_text_protocol() {
    let options = CaptureOptions::for_api_level("legacy", 19);
    assert_eq!(options.version, ProtocolVersion::V1);

    let window = ScriptedWindow {
        dump: dump(ProtocolVersion::V1),
        stall: Duration::ZERO,
    };
    let bytes = capture_view(&window, &options).into_result().unwrap();
    let tree = snapshot::decode(&bytes).unwrap().parse_tree().unwrap().unwrap();
    assert_eq!(tree.len(), 2);
}

#[test]
fn stall_past_the_dump_timeout_yields_timeout_without_payload() {
    let window = ScriptedWindow {
        dump: dump(ProtocolVersion::V2),
        stall: Duration::from_secs(25),
    };
    let result = capture_view(&window, &CaptureOptions::for_api_level("main", 23));
    assert!(!result.is_success());
    assert!(result.data().is_none());
    assert!(matches!(result.failure_kind(), Some(CaptureError::Timeout)));
}

#[test]
fn saved_snapshot_reloads_and_propagation_is_idempotent() {
    let options = CaptureOptions::for_api_level("main", 23);
    let window = ScriptedWindow {
        dump: dump(options.version),
        stall: Duration::ZERO,
    };
    let bytes = capture_view(&window, &options).into_result().unwrap();

    let dir = tempdir().unwrap();
    let now = chrono::Utc::now();
    let path = save_to_file(dir.path(), None, "demo", &bytes, &now).unwrap();
    assert!(path.starts_with(dir.path().join("captures")));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("liv2"));

    let mut tree = read_snapshot_file(&path).unwrap().parse_tree().unwrap().unwrap();
    let drawn = |tree: &ViewTree| -> Vec<bool> {
        tree.preorder().iter().map(|id| tree.node(*id).is_drawn()).collect()
    };
    let first = drawn(&tree);
    tree.update_node_drawn();
    assert_eq!(drawn(&tree), first);

    let child = tree.select("/0").unwrap();
    tree.set_forced_state(child, ForcedState::Invisible);
    assert!(!tree.node(child).is_drawn());
    tree.set_forced_state(child, ForcedState::None);
    assert_eq!(drawn(&tree), first);
}
