use super::*;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("docpilot-host-{name}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

async fn file_host(dir: &Path, markup: &str, style: &str) -> FileHost {
    let markup_path = dir.join("index.html");
    let style_path = dir.join("style.css");
    std::fs::write(&markup_path, markup).unwrap();
    std::fs::write(&style_path, style).unwrap();
    FileHost::load(markup_path, style_path, None).await
}

#[test]
fn selection_is_not_an_edit() {
    let c = ComponentRef::new("c1", "text");
    assert!(!HostEvent::ComponentSelected(c.clone()).is_edit());
    assert!(HostEvent::ComponentAdded(c.clone()).is_edit());
    assert!(HostEvent::ComponentRemoved(c.clone()).is_edit());
    assert!(
        HostEvent::StyleChanged { target: c, property: "color".into(), value: None, previous_value: None }.is_edit()
    );
}

#[test]
fn component_accessor_covers_style_changes() {
    let c = ComponentRef::new("c9", "image").with_tag("img");
    let event = HostEvent::StyleChanged { target: c.clone(), property: "width".into(), value: None, previous_value: None };
    assert_eq!(event.component(), &c);
}

#[test]
fn empty_component_ref() {
    assert!(ComponentRef::default().is_empty());
    assert!(ComponentRef::new("", "").is_empty());
    assert!(!ComponentRef { tag_name: Some("img".into()), ..ComponentRef::default() }.is_empty());
    assert!(!ComponentRef { classes: vec!["hero".into()], ..ComponentRef::default() }.is_empty());
}

#[tokio::test]
async fn file_host_reads_markup_style_and_counts_tags() {
    let dir = temp_dir("read");
    let host = file_host(&dir, "<main><h1>Hi</h1><p>text</p></main>", "h1 { color: red; }").await;
    assert!(host.markup().contains("<h1>"));
    assert_eq!(host.style_sheet(), "h1 { color: red; }");
    assert_eq!(host.component_count(), 3);
}

#[tokio::test]
async fn file_host_serializes_fallback_state_without_project_file() {
    let dir = temp_dir("state");
    let host = file_host(&dir, "<p>a</p>", "p{}").await;
    let state = host.serialized_state();
    assert_eq!(state["styles"], "p{}");
    assert_eq!(state["pages"][0]["markup"], "<p>a</p>");
    assert!(state["assets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn file_host_prefers_project_file() {
    let dir = temp_dir("project");
    let project_path = dir.join("project.json");
    std::fs::write(&project_path, r#"{"assets":[{"src":"logo.png"}]}"#).unwrap();
    let markup_path = dir.join("index.html");
    let style_path = dir.join("style.css");
    std::fs::write(&markup_path, "<p>a</p>").unwrap();
    std::fs::write(&style_path, "").unwrap();
    let host = FileHost::load(markup_path, style_path, Some(project_path)).await;
    assert_eq!(host.serialized_state()["assets"][0]["src"], "logo.png");
}

#[tokio::test]
async fn missing_file_reads_as_empty() {
    let dir = temp_dir("missing");
    let host = FileHost::load(dir.join("nope.html"), dir.join("nope.css"), None).await;
    assert_eq!(host.markup(), "");
    assert_eq!(host.component_count(), 0);
}

#[tokio::test]
async fn refresh_emits_one_event_per_changed_file() {
    let dir = temp_dir("refresh");
    let host = file_host(&dir, "<p>a</p>", "p{}").await;
    assert!(host.refresh().await.is_empty());

    std::fs::write(dir.join("index.html"), "<p>b</p>").unwrap();
    std::fs::write(dir.join("style.css"), "p{color:red}").unwrap();
    let events = host.refresh().await;
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], HostEvent::ComponentUpdated(_)));
    assert!(matches!(events[1], HostEvent::StyleChanged { .. }));
    assert_eq!(host.markup(), "<p>b</p>");

    assert!(host.refresh().await.is_empty());
}

#[tokio::test]
async fn reads_serve_loaded_contents_until_refresh() {
    let dir = temp_dir("cached");
    let host = file_host(&dir, "<p>a</p>", "").await;
    std::fs::write(dir.join("index.html"), "<p>a</p><p>b</p>").unwrap();
    assert_eq!(host.component_count(), 1);
    host.refresh().await;
    assert_eq!(host.component_count(), 2);
}

#[tokio::test]
async fn watch_forwards_file_edits_as_events() {
    let dir = temp_dir("watch");
    let host = Arc::new(file_host(&dir, "<p>a</p>", "p{}").await);
    let (tx, mut rx) = mpsc::channel(8);
    let _watch = host.watch(tx).unwrap();

    std::fs::write(dir.join("index.html"), "<p>changed</p>").unwrap();
    // A write can surface as several events (truncate, then data).
    let settled = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            assert!(matches!(event, HostEvent::ComponentUpdated(_)));
            if host.markup() == "<p>changed</p>" {
                return true;
            }
        }
        false
    })
    .await;
    assert!(matches!(settled, Ok(true)));
}

#[tokio::test]
async fn watch_ignores_unrelated_files() {
    let dir = temp_dir("unrelated");
    let host = Arc::new(file_host(&dir, "<p>a</p>", "p{}").await);
    let (tx, mut rx) = mpsc::channel(8);
    let _watch = host.watch(tx).unwrap();

    std::fs::write(dir.join("notes.txt"), "hello").unwrap();
    let waited = tokio::time::timeout(std::time::Duration::from_millis(300), rx.recv()).await;
    assert!(waited.is_err());
}
