use hitl_packet::prelude::*;
use hitl_packet::{ArtifactFormat, SessionListing, SCHEMA_VERSION};
use hitl_test_utils::{make_packet, make_record, packet_with_ids, PacketDir};
use pretty_assertions::assert_eq;
use serde_json::json;

fn directory(dir: &PacketDir) -> PacketDirectory {
    PacketDirectory::new(DiscoveryConfig::default().with_packet_dir(dir.path()))
}

#[test]
fn test_discover_load_review_export() {
    let dir = PacketDir::new();
    let mut flagged = make_record("POL-002");
    flagged["keyword"]["quality_flags"]["low_source_diversity"] = json!(true);
    flagged["ai"] = json!({
        "invoked": true,
        "invocation_reason": "borderline_score",
        "fused_score": 0.71,
        "reasoning": "Section 4 names the monitoring frequency."
    });
    dir.write_packet("WARP_2026", &make_packet(vec![make_record("POL-001"), flagged]));
    dir.write_artifact("WARP_2026", "csv", "engine,csv\n");

    let packets = directory(&dir);
    let sessions = packets.discover();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "WARP_2026");
    assert!(sessions[0].csv_path.is_some());

    let raw = packets.load_packet("WARP_2026").unwrap();
    let review = inspect_packet(&raw);
    assert_eq!(review.verdict(), Verdict::Clean);

    let packet = review.packet.unwrap();
    assert_eq!(packet.schema_version, SCHEMA_VERSION);
    assert_eq!(packet.flat_records(), hitl_packet::flatten_packet(&raw));

    let rows = packet.flat_records();
    assert_eq!(rows[1].quality_flags, "low_source_diversity");
    assert!(rows[1].ai_invoked);
    assert_eq!(rows[1].ai_invocation_reason, "borderline_score");

    let csv = to_csv_string(&rows).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("policy_id,tier,status,confidence,matched"));
    assert!(lines[2].starts_with("POL-002,TIER_1_BINARY,PASS,HIGH,true,5,4,0.8,5,low_source_diversity,true"));

    assert_eq!(
        packets.read_artifact("WARP_2026", ArtifactFormat::Csv).as_deref(),
        Some("engine,csv\n")
    );
}

#[test]
fn test_unsorted_packet_is_displayable_with_warning() {
    let dir = PacketDir::new();
    dir.write_packet("S1", &packet_with_ids(&["BBB", "AAA"]));

    let detail = directory(&dir).load_detail("S1").unwrap();
    assert!(!detail.validation.is_valid);
    assert_eq!(detail.validation.summary(), "Invalid (1 error)");
    assert_eq!(detail.validation.errors, vec!["Records are not sorted by policy_id"]);
}

#[test]
fn test_empty_packet_is_clean() {
    let dir = PacketDir::new();
    dir.write_packet("EMPTY", &make_packet(vec![]));

    let packets = directory(&dir);
    let sessions = packets.discover();
    assert_eq!(sessions[0].metadata.as_ref().map(|m| m.record_count), Some(0));

    let raw = packets.load_packet("EMPTY").unwrap();
    assert_eq!(inspect_packet(&raw).verdict(), Verdict::Clean);
    assert_eq!(
        to_csv_string(&flatten_packet(&raw)).unwrap().lines().count(),
        1
    );
}

#[test]
fn test_traversal_is_indistinguishable_from_missing() {
    let dir = PacketDir::new();
    dir.write_packet("S1", &packet_with_ids(&["A"]));
    let packets = directory(&dir);

    let long = "a".repeat(201);
    for id in ["../S1", "S1/../S1", "..\\S1", "S1.json", "", long.as_str(), "MISSING"] {
        assert!(packets.load_packet(id).is_none(), "{id:?}");
        assert!(packets.load_detail(id).is_none(), "{id:?}");
        assert!(packets.artifact_path(id, ArtifactFormat::Json).is_none(), "{id:?}");
    }
}

#[test]
fn test_listing_shape() {
    let dir = PacketDir::new();
    let older = dir.write_packet("OLDER", &packet_with_ids(&["A"]));
    let newer = dir.write_packet("NEWER", &packet_with_ids(&["A"]));
    dir.write_artifact("NEWER", "md", "# Report");
    dir.set_mtime(&older, 1_700_000_000);
    dir.set_mtime(&newer, 1_800_000_000);

    let listing = SessionListing::from_sessions(&directory(&dir).discover());
    let value = serde_json::to_value(&listing).unwrap();

    assert_eq!(value["count"], json!(2));
    assert_eq!(value["sessions"][0]["sessionId"], json!("NEWER"));
    assert_eq!(value["sessions"][0]["hasMD"], json!(true));
    assert_eq!(value["sessions"][0]["hasCSV"], json!(false));
    assert_eq!(value["sessions"][1]["sessionId"], json!("OLDER"));
    assert_eq!(
        value["sessions"][1]["metadata"]["session_id"],
        json!(hitl_test_utils::TEST_SESSION)
    );
}
