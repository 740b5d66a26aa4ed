mod common;

use std::sync::Arc;

use common::path;
use fsmanage_core::{Item, ItemKind, MetadataValue, props};
use fsmanage_ops::{
    ItemFilter, MemoryFs, NamePattern, OperationExecutor, PathPattern, ValuePattern,
    match_item_metadata, match_item_name, match_item_path, render_path_posix,
};
use regex::Regex;

fn executor() -> (MemoryFs, Arc<OperationExecutor>) {
    let fs = MemoryFs::new();
    fs.write_file("src/main.rs", "fn main() {}");
    fs.write_file("src/lib.rs", "");
    fs.write_file("notes.txt", "remember");
    let executor = Arc::new(fs.executor());
    (fs, executor)
}

async fn matching(filter: &ItemFilter, fs: &MemoryFs, executor: &Arc<OperationExecutor>) -> Vec<String> {
    let mut names = Vec::new();
    for path in fs.paths() {
        let item = fs.item(&path.render("", "/")).unwrap();
        if filter.matches(&item, executor).await {
            names.push(item.path().render("", "/"));
        }
    }
    names
}

#[tokio::test]
async fn test_kind_filter() {
    let (fs, executor) = executor();
    let dirs = ItemFilter::Kind(ItemKind::Dir);
    assert_eq!(matching(&dirs, &fs, &executor).await, vec!["src"]);

    let everything = ItemFilter::Kind(ItemKind::Item);
    assert_eq!(matching(&everything, &fs, &executor).await.len(), 4);
}

#[tokio::test]
async fn test_name_patterns() {
    let (fs, executor) = executor();

    let exact = match_item_name(NamePattern::exact("lib.rs"));
    assert_eq!(matching(&exact, &fs, &executor).await, vec!["src/lib.rs"]);

    let glob = match_item_name(NamePattern::glob("*.rs").unwrap());
    assert_eq!(
        matching(&glob, &fs, &executor).await,
        vec!["src/lib.rs", "src/main.rs"]
    );

    let regex = match_item_name(NamePattern::regex(r"\.txt$").unwrap());
    assert_eq!(matching(&regex, &fs, &executor).await, vec!["notes.txt"]);
}

#[tokio::test]
async fn test_root_never_matches_name() {
    let (_fs, executor) = executor();
    let filter = match_item_name(NamePattern::regex(".*").unwrap());
    assert!(!filter.matches(&Item::root(), &executor).await);
}

#[tokio::test]
async fn test_path_patterns() {
    let (fs, executor) = executor();

    let components = match_item_path(PathPattern::Components(path("src/main.rs")), render_path_posix());
    assert_eq!(matching(&components, &fs, &executor).await, vec!["src/main.rs"]);

    let rendered = match_item_path(PathPattern::Rendered("/notes.txt".to_string()), render_path_posix());
    assert_eq!(matching(&rendered, &fs, &executor).await, vec!["notes.txt"]);

    let regex = match_item_path(
        PathPattern::Regex(Regex::new("^/src/").unwrap()),
        render_path_posix(),
    );
    assert_eq!(matching(&regex, &fs, &executor).await.len(), 2);
}

#[tokio::test]
async fn test_metadata_patterns() {
    let (fs, executor) = executor();

    let empty = match_item_metadata(props::SIZE, ValuePattern::Exact(MetadataValue::Size(0)));
    assert_eq!(matching(&empty, &fs, &executor).await, vec!["src/lib.rs"]);

    // Directories have no size, which matches as an empty string.
    let no_size = match_item_metadata(props::SIZE, ValuePattern::Regex(Regex::new("^$").unwrap()));
    assert_eq!(matching(&no_size, &fs, &executor).await, vec!["src"]);
}

#[tokio::test]
async fn test_combined_filters() {
    let (fs, executor) = executor();

    let rust_files = ItemFilter::Kind(ItemKind::File) & match_item_name(NamePattern::glob("*.rs").unwrap());
    let filter = rust_files | match_item_name(NamePattern::exact("notes.txt"));

    assert_eq!(
        matching(&filter, &fs, &executor).await,
        vec!["notes.txt", "src/lib.rs", "src/main.rs"]
    );
}

#[tokio::test]
async fn test_custom_predicate_queries_executor() {
    let (fs, executor) = executor();

    let has_children = ItemFilter::predicate(|item, executor| async move {
        let metadata = executor.get_metadata(&item, &[props::ITEMS]).await;
        metadata
            .get(props::ITEMS)
            .and_then(MetadataValue::as_items)
            .is_some_and(|items| !items.is_empty())
    });

    assert_eq!(matching(&has_children, &fs, &executor).await, vec!["src"]);
}
