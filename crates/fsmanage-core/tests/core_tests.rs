use fsmanage_core::{AttentionItems, Item, ItemError, ItemKind, ItemPath, OperableItem};

fn test_path() -> ItemPath {
    ItemPath::new(["first", "second", "third"])
}

#[test]
fn test_item_path() {
    let item = Item::new(test_path());
    assert_eq!(item.path(), &test_path());
    assert_eq!(item.kind(), ItemKind::Item);
}

#[test]
fn test_item_equality() {
    assert_eq!(Item::new(test_path()), Item::new(test_path()));
    assert_ne!(Item::new(test_path()), Item::new(ItemPath::new(["a", "b"])));
}

#[test]
fn test_root_is_empty_dir() {
    let root = Item::root();
    assert!(root.is_dir());
    assert!(root.path().is_root());
}

#[test]
fn test_operable_item_parent_and_name() {
    let item = OperableItem::new(test_path(), ItemKind::Item).unwrap();
    assert_eq!(item.parent(), ItemPath::new(["first", "second"]));
    assert_eq!(item.name(), "third");
}

#[test]
fn test_operable_item_single_component() {
    let item = OperableItem::file(ItemPath::new(["name"])).unwrap();
    assert_eq!(item.parent(), ItemPath::root());
    assert_eq!(item.name(), "name");
    assert!(item.parent_dir().is_dir());
}

#[test]
fn test_operable_item_empty_path() {
    let err = OperableItem::dir(ItemPath::root()).unwrap_err();
    assert_eq!(err, ItemError::EmptyPath { kind: ItemKind::Dir });
}

#[test]
fn test_operable_item_serde_rejects_empty_path() {
    let json = serde_json::to_string(&Item::file(ItemPath::root())).unwrap();
    assert!(serde_json::from_str::<OperableItem>(&json).is_err());

    let json = serde_json::to_string(&Item::file(test_path())).unwrap();
    let item: OperableItem = serde_json::from_str(&json).unwrap();
    assert_eq!(item.kind(), ItemKind::File);
}

#[test]
fn test_attention_items() {
    let attention = AttentionItems::new(
        Some(Item::new(ItemPath::new(["parent"]))),
        [
            Item::new(ItemPath::new(["a", "one"])),
            Item::new(ItemPath::new(["a", "two"])),
        ],
    );

    assert_eq!(attention.len(), 2);
    assert!(attention.contains(&ItemPath::new(["a", "two"])));
    assert_eq!(attention.parent(), Some(&Item::new(ItemPath::new(["parent"]))));
}

#[test]
fn test_attention_items_defaults() {
    let attention = AttentionItems::empty();
    assert_eq!(attention.items().count(), 0);
    assert!(attention.parent().is_none());
    assert!(attention.is_empty());
}

#[test]
fn test_attention_items_union() {
    let one = Item::new(ItemPath::new(["one"]));
    let two = Item::new(ItemPath::new(["two"]));
    let three = Item::new(ItemPath::new(["three"]));

    let first = AttentionItems::new(None, [one.clone(), two.clone()]);
    let second = AttentionItems::new(None, [two.clone(), three.clone()]);

    let forward = first.extended(&second);
    let backward = second.extended(&first);
    assert_eq!(forward.len(), 3);
    // Union on items is commutative.
    assert_eq!(forward, backward);
}

#[test]
fn test_attention_parent_both_missing() {
    let attention = AttentionItems::empty().extended(&AttentionItems::empty());
    assert!(attention.parent().is_none());
}

#[test]
fn test_attention_parent_one_missing() {
    let parent = Item::new(ItemPath::new(["parent"]));
    let with_parent = AttentionItems::parent_only(parent.clone());
    let without = AttentionItems::empty();

    assert_eq!(with_parent.extended(&without).parent(), Some(&parent));
    assert_eq!(without.extended(&with_parent).parent(), Some(&parent));
}

#[test]
fn test_attention_parent_both_present() {
    let one = AttentionItems::parent_only(Item::new(ItemPath::new(["parent", "one"])));
    let two = AttentionItems::parent_only(Item::new(ItemPath::new(["parent", "two"])));

    assert_eq!(
        one.extended(&two).parent(),
        Some(&Item::new(ItemPath::new(["parent", "two"])))
    );
}
