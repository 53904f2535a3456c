use mimeroute::cli::{Cli, build_plan, execute};
use mimeroute::config::{ConfigFile, RunPlan};
use mimeroute::pipeline::{Pipeline, PipelineContext, PipelineMode, run_all};
use mimeroute::router::{CategoryMap, SourceRoot, WorkItem};
/// Integration tests for mimeroute
///
/// These tests build real directory trees and run the complete
/// walk-classify-route pipeline over them.
///
/// Test categories:
/// 1. Routing scenarios
/// 2. Invariants over whole trees
/// 3. Configuration and validation
/// 4. CLI execution
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary workspace holding an `import` source tree and destination
/// directories next to it.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    /// Create a new fixture with an empty `import` directory.
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("import")).expect("Failed to create import dir");
        TestFixture { temp_dir }
    }

    /// The source root.
    fn import(&self) -> PathBuf {
        self.temp_dir.path().join("import")
    }

    /// Create a destination directory and return its path.
    fn destination(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::create_dir_all(&path).expect("Failed to create destination");
        path
    }

    /// Create a file (and its parent directories) below the source root.
    fn create_file(&self, rel_path: &str) {
        let path = self.import().join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
        let mut file = File::create(&path).expect("Failed to create file");
        file.write_all(rel_path.as_bytes())
            .expect("Failed to write file content");
    }

    fn create_files(&self, rel_paths: &[&str]) {
        for rel_path in rel_paths {
            self.create_file(rel_path);
        }
    }

    fn root(&self) -> SourceRoot {
        SourceRoot::new(self.import()).expect("import should be a directory")
    }

    /// Run the threaded pipeline and collect every work item.
    fn route(&self, categories: CategoryMap) -> Vec<WorkItem> {
        let ctx = PipelineContext::new(categories);
        Pipeline::spawn(&ctx, &self.root())
            .map(|r| r.expect("pipeline error"))
            .collect()
    }

    /// List every regular file below the source root.
    fn list_files_recursive(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        Self::walk_dir(&self.import(), &mut files);
        files.sort();
        files
    }

    fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    files.push(path);
                } else if path.is_dir() {
                    Self::walk_dir(&path, files);
                }
            }
        }
    }
}

fn pairs(items: &[WorkItem]) -> Vec<(PathBuf, PathBuf)> {
    items
        .iter()
        .map(|i| (i.source.clone(), i.destination.clone()))
        .collect()
}

// ============================================================================
// Test Suite 1: Routing Scenarios
// ============================================================================

#[test]
fn test_image_and_video_are_routed() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.jpg", "sub/b.mp4"]);
    let photos = fixture.destination("photos");
    let videos = fixture.destination("videos");

    let items = fixture.route(
        [("image", photos.clone()), ("video", videos.clone())]
            .into_iter()
            .collect(),
    );

    assert_eq!(
        pairs(&items),
        vec![
            (fixture.import().join("a.jpg"), photos.join("a.jpg")),
            (fixture.import().join("sub/b.mp4"), videos.join("sub/b.mp4")),
        ]
    );
}

#[test]
fn test_no_matching_category_yields_nothing() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.jpg", "sub/b.mp4"]);
    let music = fixture.destination("music");

    let items = fixture.route([("audio", music)].into_iter().collect());
    assert!(items.is_empty());
}

#[test]
fn test_pdf_routes_to_application_destination() {
    let fixture = TestFixture::new();
    fixture.create_file("doc.pdf");
    let docs = fixture.destination("docs");

    let items = fixture.route([("application", docs.clone())].into_iter().collect());
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, fixture.import().join("doc.pdf"));
    assert_eq!(items[0].destination, docs.join("doc.pdf"));
    assert_eq!(items[0].mime_type, "application/pdf");
}

#[test]
fn test_deeply_nested_structure_is_preserved() {
    let fixture = TestFixture::new();
    fixture.create_file("2024/06/holiday/beach/IMG_0001.png");
    let photos = fixture.destination("photos");

    let items = fixture.route([("image", photos.clone())].into_iter().collect());
    assert_eq!(
        items[0].destination,
        photos.join("2024/06/holiday/beach/IMG_0001.png")
    );
}

#[test]
fn test_extensionless_files_and_directories_are_ignored() {
    let fixture = TestFixture::new();
    fixture.create_files(&["README", "Makefile", "notes/LICENSE"]);
    fs::create_dir_all(fixture.import().join("folder.jpg")).unwrap();
    let everything = fixture.destination("all");

    let items = fixture.route(
        ["image", "text", "application", "video", "audio"]
            .into_iter()
            .map(|c| (c, everything.clone()))
            .collect(),
    );
    assert!(items.is_empty(), "unexpected items: {:?}", items);
}

#[test]
fn test_empty_source_root() {
    let fixture = TestFixture::new();
    let photos = fixture.destination("photos");
    assert!(fixture.route([("image", photos)].into_iter().collect()).is_empty());
}

// ============================================================================
// Test Suite 2: Invariants
// ============================================================================

#[test]
fn test_exactly_one_item_per_routable_file() {
    let fixture = TestFixture::new();
    fixture.create_files(&[
        "a.jpg",
        "b.JPG",
        "c.png",
        "d.mp3",
        "e.mp4",
        "f.txt",
        "g.unknownext",
        "h",
        "nested/i.gif",
        "nested/deeper/j.flac",
        "nested/deeper/k.pdf",
    ]);
    let photos = fixture.destination("photos");
    let music = fixture.destination("music");

    let items = fixture.route(
        [("image", photos.clone()), ("audio", music.clone())]
            .into_iter()
            .collect(),
    );

    let routed: HashSet<PathBuf> = items.iter().map(|i| i.source.clone()).collect();
    assert_eq!(routed.len(), items.len(), "a file was routed twice");

    let table = mimeroute::MimeTable::standard();
    for file in fixture.list_files_recursive() {
        let category = table
            .mime_for_path(&file)
            .map(mimeroute::mime_table::top_level_category);
        let expected = matches!(category, Some("image") | Some("audio"));
        assert_eq!(routed.contains(&file), expected, "{}", file.display());
    }

    for item in &items {
        let relative = item.source.strip_prefix(fixture.import()).unwrap();
        let root = if item.category == "image" { &photos } else { &music };
        assert_eq!(item.destination, root.join(relative));
        assert!(item.source.is_file());
    }
}

#[test]
fn test_threaded_and_single_thread_runs_are_identical() {
    let fixture = TestFixture::new();
    for i in 0..50 {
        fixture.create_file(&format!("dir_{}/photo_{}.jpg", i % 7, i));
        fixture.create_file(&format!("dir_{}/clip_{}.mov", i % 5, i));
    }
    let photos = fixture.destination("photos");
    let videos = fixture.destination("videos");
    let ctx = PipelineContext::new(
        [("image", photos), ("video", videos)].into_iter().collect(),
    )
    .with_channel_capacity(3);
    let roots = vec![fixture.root()];

    let mut threaded: Vec<WorkItem> = Vec::new();
    let mut single: Vec<WorkItem> = Vec::new();
    let mut again: Vec<WorkItem> = Vec::new();
    run_all(&ctx, &roots, &mut threaded, PipelineMode::Threaded);
    run_all(&ctx, &roots, &mut single, PipelineMode::SingleThread);
    run_all(&ctx, &roots, &mut again, PipelineMode::Threaded);

    assert_eq!(threaded.len(), 100);
    assert_eq!(threaded, single);
    assert_eq!(threaded, again);
}

#[test]
fn test_multiple_sources_share_destinations() {
    let first = TestFixture::new();
    first.create_file("trip/a.jpg");
    let second = TestFixture::new();
    second.create_file("trip/b.jpg");
    let photos = first.destination("photos");

    let ctx = PipelineContext::new([("image", photos.clone())].into_iter().collect());
    let mut items: Vec<WorkItem> = Vec::new();
    let summary = run_all(
        &ctx,
        &[first.root(), second.root()],
        &mut items,
        PipelineMode::Threaded,
    );

    assert_eq!(
        items.iter().map(|i| i.destination.clone()).collect::<Vec<_>>(),
        vec![photos.join("trip/a.jpg"), photos.join("trip/b.jpg")]
    );
    assert_eq!(summary.total(), 2);
    assert!(summary.failed_roots.is_empty());
}

// ============================================================================
// Test Suite 3: Configuration
// ============================================================================

#[test]
fn test_config_file_drives_a_run() {
    let fixture = TestFixture::new();
    fixture.create_files(&["shot.cr2", "a.jpg", ".cache/b.jpg", "c.jpg.part"]);
    let photos = fixture.destination("photos");
    let raw = fixture.destination("raw");

    let config = ConfigFile::from_toml(&format!(
        r#"
sources = [{source:?}]
channel_capacity = 2

[destinations]
image = {photos:?}
raw = {raw:?}

[extensions]
cr2 = "raw/x-canon-cr2"
part = "image/x-partial"

[filters]
skip_hidden = true
exclude_patterns = ["*.part"]
"#,
        source = fixture.import().to_string_lossy(),
        photos = photos.to_string_lossy(),
        raw = raw.to_string_lossy(),
    ))
    .unwrap();
    let plan = RunPlan::build(config).unwrap();

    let mut items: Vec<WorkItem> = Vec::new();
    run_all(&plan.context, &plan.sources, &mut items, PipelineMode::Threaded);

    assert_eq!(
        pairs(&items),
        vec![
            (fixture.import().join("a.jpg"), photos.join("a.jpg")),
            (fixture.import().join("shot.cr2"), raw.join("shot.cr2")),
        ]
    );
}

#[test]
fn test_mime_types_file_extends_table() {
    let fixture = TestFixture::new();
    fixture.create_file("scan.nef");
    let photos = fixture.destination("photos");
    let mime_types = fixture.temp_dir.path().join("mime.types");
    fs::write(&mime_types, "# local types\nimage/x-nikon-nef nef nrw\n").unwrap();

    let mut config = ConfigFile {
        sources: vec![fixture.import().to_string_lossy().into_owned()],
        mime_types_file: Some(mime_types.to_string_lossy().into_owned()),
        ..Default::default()
    };
    config
        .destinations
        .insert("image".to_string(), photos.to_string_lossy().into_owned());
    let plan = RunPlan::build(config).unwrap();

    let mut items: Vec<WorkItem> = Vec::new();
    run_all(&plan.context, &plan.sources, &mut items, PipelineMode::SingleThread);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].destination, photos.join("scan.nef"));
}

#[test]
fn test_validation_rejects_missing_destination() {
    let fixture = TestFixture::new();
    let mut config = ConfigFile {
        sources: vec![fixture.import().to_string_lossy().into_owned()],
        ..Default::default()
    };
    config.destinations.insert(
        "image".to_string(),
        fixture.temp_dir.path().join("nope").to_string_lossy().into_owned(),
    );
    assert!(RunPlan::build(config).is_err());
}

// ============================================================================
// Test Suite 4: CLI Execution
// ============================================================================

fn cli_for(fixture: &TestFixture, extra: &[&str]) -> Cli {
    let config_path = fixture.temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").unwrap();
    let mut args = vec![
        "mimeroute".to_string(),
        "-c".to_string(),
        config_path.to_string_lossy().into_owned(),
        "-s".to_string(),
        fixture.import().to_string_lossy().into_owned(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    <Cli as clap::Parser>::parse_from(args)
}

#[test]
fn test_cli_prints_text_lines() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.jpg", "sub/b.mp4", "c.txt"]);
    let photos = fixture.destination("photos");
    let videos = fixture.destination("videos");
    let image_arg = format!("image={}", photos.display());
    let video_arg = format!("video={}", videos.display());

    let cli = cli_for(&fixture, &["-d", &image_arg, "-d", &video_arg]);
    let plan = build_plan(&cli).unwrap();
    let mut out: Vec<u8> = Vec::new();
    let summary = execute(&cli, &plan, &mut out);

    let text = String::from_utf8(out).unwrap();
    let expected = format!(
        "{} -> {}\n{} -> {}\n",
        fixture.import().join("a.jpg").display(),
        photos.join("a.jpg").display(),
        fixture.import().join("sub/b.mp4").display(),
        videos.join("sub/b.mp4").display(),
    );
    assert_eq!(text, expected);
    assert_eq!(summary.total(), 2);
}

#[test]
fn test_cli_limit_stops_early() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
    let photos = fixture.destination("photos");
    let image_arg = format!("image={}", photos.display());

    let cli = cli_for(&fixture, &["-d", &image_arg, "--limit", "2", "--format", "json"]);
    let plan = build_plan(&cli).unwrap();
    let mut out: Vec<u8> = Vec::new();
    let summary = execute(&cli, &plan, &mut out);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["category"], "image");
    assert!(summary.stopped_early);
}

#[test]
fn test_cli_requires_destinations() {
    let fixture = TestFixture::new();
    let cli = cli_for(&fixture, &[]);
    let err = build_plan(&cli).unwrap_err();
    assert_eq!(err, "No destinations specified");
}

#[test]
fn test_cli_rejects_destination_that_is_a_file() {
    let fixture = TestFixture::new();
    let file = fixture.temp_dir.path().join("photos.txt");
    fs::write(&file, "x").unwrap();
    let image_arg = format!("image={}", file.display());

    let cli = cli_for(&fixture, &["-d", &image_arg]);
    let err = build_plan(&cli).unwrap_err();
    assert!(err.contains("is not a directory"), "{}", err);
}

#[cfg(unix)]
#[test]
fn test_cli_json_skips_file_with_non_utf8_name() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fixture = TestFixture::new();
    fs::write(fixture.import().join(OsStr::from_bytes(b"a\xff.jpg")), "x").unwrap();
    fixture.create_files(&["b.jpg", "c.jpg"]);
    let second = TestFixture::new();
    second.create_file("d.jpg");
    let photos = fixture.destination("photos");
    let image_arg = format!("image={}", photos.display());
    let second_src = second.import().to_string_lossy().into_owned();

    let cli = cli_for(
        &fixture,
        &["-d", &image_arg, "-s", &second_src, "--format", "json"],
    );
    let plan = build_plan(&cli).unwrap();
    let mut out: Vec<u8> = Vec::new();
    let summary = execute(&cli, &plan, &mut out);

    let text = String::from_utf8(out).unwrap();
    let sources: Vec<String> = text
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["source"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        sources,
        vec![
            fixture.import().join("b.jpg").to_string_lossy().into_owned(),
            fixture.import().join("c.jpg").to_string_lossy().into_owned(),
            second.import().join("d.jpg").to_string_lossy().into_owned(),
        ]
    );
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.item_errors, 1);
    assert!(!summary.stopped_early);
}

#[cfg(unix)]
#[test]
fn test_cli_text_routes_file_with_non_utf8_name() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fixture = TestFixture::new();
    fs::write(fixture.import().join(OsStr::from_bytes(b"a\xff.jpg")), "x").unwrap();
    let photos = fixture.destination("photos");
    let image_arg = format!("image={}", photos.display());

    let cli = cli_for(&fixture, &["-d", &image_arg]);
    let plan = build_plan(&cli).unwrap();
    let mut out: Vec<u8> = Vec::new();
    let summary = execute(&cli, &plan, &mut out);

    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    assert_eq!(summary.total(), 1);
    assert_eq!(summary.item_errors, 0);
}
