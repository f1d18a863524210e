use dreamcore::source::{load_items, sample, DatasetKind, SourceOptions};
use dreamcore::Item;
use std::fs;
use tempfile::tempdir;

fn report(tag: &str) -> String {
    format!("{tag} I was flying over the ocean and the water was glowing beneath me.")
}

#[test]
fn dreamviews_filters_lucidity_and_prefixes_ids() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dreamviews.tsv");
    let body = format!(
        "post_id\tlucidity\tpost_clean\n1\tlucid\t{}\n2\tunknown\t{}\n3\tnonlucid\t{}\n4\tlucid\ttoo short\n",
        report("one"),
        report("two"),
        report("three"),
    );
    fs::write(&path, body).unwrap();

    let items = load_items(&path, &SourceOptions::for_kind(DatasetKind::DreamViews)).unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["DV-1", "DV-3"]);
}

#[test]
fn sddb_ids_are_positional_after_dropping_empty_text() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("SDDb.csv");
    let body = format!(
        "answer_text,respondent\n\"{}\",r1\n,r2\nshort,r3\n\"{}\",r4\n",
        report("first"),
        report("second"),
    );
    fs::write(&path, body).unwrap();

    let items = load_items(&path, &SourceOptions::for_kind(DatasetKind::Sddb)).unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    // the empty row gets no id, the short one is counted then filtered
    assert_eq!(ids, vec!["SDDB-000000", "SDDB-000002"]);
}

#[test]
fn flying_drops_comments_unless_asked() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flying.csv");
    let body = format!(
        "dream_ID,report_type,dream\nfly-a1,1,\"{}\"\nfly-b2,2,\"{}\"\n",
        report("dream"),
        report("comment"),
    );
    fs::write(&path, body).unwrap();

    let mut opts = SourceOptions::for_kind(DatasetKind::Flying);
    let items = load_items(&path, &opts).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "fly-a1");
    opts.dreams_only = false;
    assert_eq!(load_items(&path, &opts).unwrap().len(), 2);
}

#[test]
fn generic_directory_of_json_and_jsonl() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("a.json"),
        format!(r#"[{{"id": "x1", "text": "{}"}}, {{"id": 7, "text": "{}"}}]"#, report("x"), report("seven")),
    )
    .unwrap();
    fs::write(
        dir.path().join("b.jsonl"),
        format!("{{\"id\": \"y1\", \"text\": \"  \\\"{}\\\"  \"}}\n\n", report("y")),
    )
    .unwrap();
    fs::write(dir.path().join("notes.md"), "ignored").unwrap();

    let items = load_items(dir.path(), &SourceOptions::for_kind(DatasetKind::Generic)).unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["x1", "7", "y1"]);
    assert!(items[2].text.starts_with("'y I was flying"));
    assert!(items[2].text.ends_with("me.'"));
}

#[test]
fn duplicate_ids_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dupes.jsonl");
    let line = format!("{{\"id\": \"same\", \"text\": \"{}\"}}\n", report("dup"));
    fs::write(&path, line.repeat(2)).unwrap();

    let err = load_items(&path, &SourceOptions::for_kind(DatasetKind::Generic)).unwrap_err();
    assert!(err.to_string().contains("duplicate item id 'same'"));
}

#[test]
fn sample_is_deterministic_and_keeps_order() {
    let items: Vec<Item> = (0..500).map(|i| Item::new(format!("id-{i}"), format!("text {i}"))).collect();
    let a = sample(items.clone(), 100, 32);
    let b = sample(items.clone(), 100, 32);
    let c = sample(items.clone(), 100, 33);

    assert_eq!(a.len(), 100);
    assert_eq!(a, b);
    assert_ne!(a, c);
    let positions: Vec<usize> = a.iter().map(|i| i.id[3..].parse().unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(sample(items[..10].to_vec(), 100, 32).len(), 10);
}
