//! End-to-end tests for bookcheck
//!
//! These tests replay the fixture book against a real shell:
//! 1. Copying the fixture book into a scratch directory
//! 2. Writing a scenario next to it
//! 3. Running the scenario and inspecting the result

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use bookcheck::common::config::Config;
use bookcheck::testing::{run_scenario, RunOptions, TestResult};
use bookcheck::{Chapter, Error, StepKind};

/// Test context with a scratch directory holding the book and scenarios
struct TestContext {
    /// Scratch directory for this test
    dir: tempfile::TempDir,
    /// Path to fixtures directory
    fixtures_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let manifest_dir = env!("CARGO_MANIFEST_DIR");
        let fixtures_dir = PathBuf::from(manifest_dir).join("tests").join("fixtures");
        let dir = tempfile::tempdir().expect("Failed to create scratch dir");

        fs::copy(fixtures_dir.join("book.html"), dir.path().join("book.html"))
            .expect("Failed to copy book fixture");

        Self { dir, fixtures_dir }
    }

    /// The fixture scenario that exercises every step
    fn full_scenario(&self) -> String {
        fs::read_to_string(self.fixtures_dir.join("chapter.yaml"))
            .expect("Failed to read scenario fixture")
    }

    fn write_scenario(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write scenario");
        path
    }

    fn write_book(&self, content: &str) {
        fs::write(self.dir.path().join("book.html"), content).expect("Failed to write book");
    }

    async fn run(&self, name: &str, content: &str) -> bookcheck::Result<TestResult> {
        let path = self.write_scenario(name, content);
        run_scenario(&path, &Config::default(), &RunOptions::default()).await
    }
}

/// Run git in `dir` with a throwaway identity
fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Book Check", "-c", "user.email=bookcheck@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {:?} failed", args);
}

/// Book whose chapter writes `project/hello.txt` and stages it in a fresh
/// repository
const REFERENCE_BOOK: &str = r#"<html><body>
<div class="sect1"></div>
<div class="sect1">
<div class="listingblock"><div class="title">project/hello.txt</div><pre>hi
</pre></div>
<div class="listingblock"><pre>$ <strong>git init -q</strong>
$ <strong>git add .</strong></pre></div>
</div>
</body></html>"#;

/// Known-good repository next to the scenarios:
/// branch `end` and tag `endtag` hold `hi`, tag `changed` holds `bye`
fn write_reference_repo(root: &Path) {
    let repo = root.join("reference");
    fs::create_dir(&repo).expect("Failed to create reference repo");
    git(&repo, &["init", "-q"]);
    fs::write(repo.join("hello.txt"), "hi\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "end state"]);
    git(&repo, &["branch", "end"]);
    git(&repo, &["tag", "endtag"]);
    fs::write(repo.join("hello.txt"), "bye\n").unwrap();
    git(&repo, &["commit", "-q", "-am", "later change"]);
    git(&repo, &["tag", "changed"]);
}

fn reference_scenario(tag: &str) -> String {
    format!(
        r#"
name: Reference {tag}
book: book.html
project: project
actions:
  - action: write
    listing: 0
  - action: run
    command: 1
  - action: run
    command: 2
reference:
  repo: reference
  tag: {tag}
"#
    )
}

// ============== Tests ==============

#[test]
fn test_fixture_chapter_parses_in_document_order() {
    let ctx = TestContext::new();
    let chapter = Chapter::load(&ctx.dir.path().join("book.html"), 1).unwrap();

    let kinds: Vec<&str> = chapter.steps().iter().map(|s| s.kind.name()).collect();
    assert_eq!(
        kinds,
        [
            "code listing",
            "command",
            "command",
            "output",
            "command",
            "output",
            "command",
            "command",
            "output",
            "command",
            "output",
            "command",
            "output",
        ]
    );

    assert_eq!(
        chapter.steps()[0].kind,
        StepKind::CodeListing {
            filename: "hello.sh".to_string(),
            contents: "echo \"hi\"\n".to_string(),
        }
    );
    assert_eq!(chapter.steps()[4].id.as_str(), "where_am_i.0");
    assert_eq!(chapter.steps()[10].as_output(), Some("$"));
    assert!(chapter.steps()[11].command_contains("runserver"));
}

#[test]
fn test_parsing_twice_gives_equal_steps() {
    let ctx = TestContext::new();
    let book = ctx.dir.path().join("book.html");
    let first = Chapter::load(&book, 1).unwrap();
    let second = Chapter::load(&book, 1).unwrap();
    assert_eq!(first.steps(), second.steps());
}

#[tokio::test]
async fn test_full_scenario_passes() {
    let ctx = TestContext::new();
    let result = ctx.run("chapter.yaml", &ctx.full_scenario()).await.unwrap();

    assert!(result.passed, "Scenario failed: {:?}", result.error);
    assert_eq!(result.actions_run, result.actions_total);
    assert_eq!(result.actions_total, 10);
}

#[tokio::test]
async fn test_skipped_step_fails_audit() {
    let ctx = TestContext::new();
    // drop the final acknowledgement: the server output is never checked
    let scenario = ctx.full_scenario();
    let cut = scenario
        .find("  - action: acknowledge")
        .expect("fixture has an acknowledge action");
    let result = ctx.run("incomplete.yaml", &scenario[..cut]).await.unwrap();

    assert!(!result.passed);
    let error = result.error.unwrap();
    assert!(error.contains("Step 12 (listing-6.1)"), "{}", error);
    assert!(error.contains("Starting development server"), "{}", error);
}

#[tokio::test]
async fn test_mismatch_reports_step() {
    let ctx = TestContext::new();
    let result = ctx
        .run(
            "mismatch.yaml",
            r#"
name: Mismatch
book: book.html
project: project
actions:
  - action: run
    command: listing-2.0
    cwd: .
  - action: run
    command: where_am_i.0
    expect:
      output: listing-2.2
"#,
        )
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!(result.actions_run, 2);
    let error = result.error.unwrap();
    assert!(error.contains("Output 3 (listing-2.2)"), "{}", error);
    assert!(error.contains("/workspace/project"), "{}", error);
}

#[tokio::test]
async fn test_unknown_step_reference() {
    let ctx = TestContext::new();
    let result = ctx
        .run(
            "unknown.yaml",
            r#"
name: Unknown
book: book.html
project: project
actions:
  - action: write
    listing: ch09l999
"#,
        )
        .await
        .unwrap();

    assert!(!result.passed);
    assert!(result.error.unwrap().contains("ch09l999"));
}

#[tokio::test]
async fn test_unparseable_book_aborts() {
    let ctx = TestContext::new();
    ctx.write_book(
        r#"<html><body>
<div class="sect1"></div>
<div class="sect1"><div class="listingblock"><p>no pre here</p></div></div>
</body></html>"#,
    );
    let err = ctx
        .run(
            "broken.yaml",
            "name: Broken\nbook: book.html\nproject: project\nactions: []\n",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
}

#[tokio::test]
async fn test_tree_listing_root_is_rewritten() {
    if which::which("tree").is_err() {
        eprintln!("Skipping test: tree not available");
        return;
    }

    let ctx = TestContext::new();
    ctx.write_book(
        r#"<html><body>
<div class="sect1"></div>
<div class="sect1">
<div class="listingblock"><pre>$ <strong>mkdir -p superlists/superlists &amp;&amp; touch superlists/manage.py superlists/superlists/settings.py</strong></pre></div>
<div class="listingblock"><pre>superlists/
├── manage.py
└── superlists
    └── settings.py</pre></div>
</div>
</body></html>"#,
    );
    let result = ctx
        .run(
            "tree.yaml",
            r#"
name: Tree
book: book.html
project: superlists
actions:
  - action: run
    command: 0
    cwd: .
  - action: tree
    output: 1
"#,
        )
        .await
        .unwrap();

    assert!(result.passed, "Scenario failed: {:?}", result.error);
}

#[tokio::test]
async fn test_reference_branch_matches() {
    if which::which("git").is_err() {
        eprintln!("Skipping test: git not available");
        return;
    }

    let ctx = TestContext::new();
    ctx.write_book(REFERENCE_BOOK);
    write_reference_repo(ctx.dir.path());

    let result = ctx.run("branch.yaml", &reference_scenario("end")).await.unwrap();
    assert!(result.passed, "Scenario failed: {:?}", result.error);
}

#[tokio::test]
async fn test_reference_tag_matches() {
    if which::which("git").is_err() {
        eprintln!("Skipping test: git not available");
        return;
    }

    let ctx = TestContext::new();
    ctx.write_book(REFERENCE_BOOK);
    write_reference_repo(ctx.dir.path());

    let result = ctx.run("tag.yaml", &reference_scenario("endtag")).await.unwrap();
    assert!(result.passed, "Scenario failed: {:?}", result.error);
}

#[tokio::test]
async fn test_reference_difference_fails() {
    if which::which("git").is_err() {
        eprintln!("Skipping test: git not available");
        return;
    }

    let ctx = TestContext::new();
    ctx.write_book(REFERENCE_BOOK);
    write_reference_repo(ctx.dir.path());

    let result = ctx.run("changed.yaml", &reference_scenario("changed")).await.unwrap();
    assert!(!result.passed);
    let error = result.error.unwrap();
    assert!(error.contains("Project differs from refs/tags/changed"), "{}", error);
    assert!(error.contains("-bye"), "{}", error);
}

#[tokio::test]
async fn test_unknown_reference_fails() {
    if which::which("git").is_err() {
        eprintln!("Skipping test: git not available");
        return;
    }

    let ctx = TestContext::new();
    ctx.write_book(REFERENCE_BOOK);
    write_reference_repo(ctx.dir.path());

    let result = ctx.run("missing.yaml", &reference_scenario("nowhere")).await.unwrap();
    assert!(!result.passed);
    assert!(result.error.unwrap().contains("neither a branch nor a tag"));
}
