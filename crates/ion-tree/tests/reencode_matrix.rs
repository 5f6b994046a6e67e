use ion_tree::{ContainerKind, Dom, ValueId};
use proptest::prelude::*;

const IVM: [u8; 4] = [0xe0, 0x01, 0x00, 0xea];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn stream(values: &[u8]) -> Vec<u8> {
    let mut bytes = IVM.to_vec();
    bytes.extend_from_slice(values);
    bytes
}

fn entry<'a>(dom: &'a Dom, stream: ValueId, id: ValueId) -> &'a [u8] {
    let p = dom.position(id).unwrap().unwrap();
    &dom.bytes(stream).unwrap().unwrap()[p.entry_start..p.next_value_offset]
}

#[test]
fn insert_shifts_later_siblings_without_rewriting_them() {
    init_tracing();
    let mut values = vec![0xbe, 0x95];
    values.push(0x84);
    values.extend_from_slice(b"aaaa");
    values.push(0x86);
    values.extend_from_slice(b"bbbbbb");
    values.push(0x88);
    values.extend_from_slice(b"cccccccc");

    let mut dom = Dom::new();
    let s = dom.load(stream(&values)).unwrap();
    let list = dom.get(s, 0).unwrap();
    let siblings: Vec<_> = dom.children(list).unwrap().collect();
    let before: Vec<_> = siblings
        .iter()
        .map(|&id| {
            let p = dom.position(id).unwrap().unwrap();
            (p, entry(&dom, s, id).to_vec())
        })
        .collect();

    // zero encodes as a lone type descriptor
    let zero = dom.new_scalar(0i64).unwrap();
    dom.insert(list, 0, zero).unwrap();
    let bytes = dom.flush(s).unwrap().to_vec();
    assert_eq!(&bytes[4..7], &[0xbe, 0x96, 0x20]);
    assert_eq!(bytes.len(), 4 + 2 + 22);

    for (&id, (old, content)) in siblings.iter().zip(&before) {
        let new = dom.position(id).unwrap().unwrap();
        assert_eq!(new.entry_start, old.entry_start + 1);
        assert_eq!(new.value_start, old.value_start + 1);
        assert_eq!(new.next_value_offset, old.next_value_offset + 1);
        assert_eq!(entry(&dom, s, id), content.as_slice());
        assert!(!dom.is_dirty(id).unwrap());
    }
}

#[test]
fn annotation_rewrites_only_the_annotated_entry() {
    init_tracing();
    let mut dom = Dom::new();
    let s = dom.load(stream(&[0xb4, 0x21, 0x01, 0x21, 0x02])).unwrap();
    let list = dom.get(s, 0).unwrap();
    let first = dom.get(list, 0).unwrap();
    let second = dom.get(list, 1).unwrap();
    let first_before = dom.position(first).unwrap();

    // "name" is a system symbol, so no local symbol table is needed
    dom.add_annotation(second, "name").unwrap();
    let bytes = dom.flush(s).unwrap().to_vec();
    assert_eq!(
        bytes,
        stream(&[0xb7, 0x21, 0x01, 0xe4, 0x81, 0x84, 0x21, 0x02])
    );

    assert_eq!(dom.position(first).unwrap(), first_before);
    let p = dom.position(second).unwrap().unwrap();
    assert_eq!(
        (p.entry_start, p.type_desc_start, p.value_start),
        (7, 10, 11)
    );
    assert_eq!(p.type_desc, 0x21);
}

#[test]
fn removing_a_middle_member_matches_a_fresh_encoding() {
    init_tracing();
    let mut dom = Dom::new();
    let input = stream(&[
        0xd9, 0x84, 0x21, 0x01, 0x85, 0x21, 0x02, 0x86, 0x21, 0x03,
    ]);
    let s = dom.load(input).unwrap();
    let st = dom.get(s, 0).unwrap();
    let version = dom.get_field(st, "version").unwrap().unwrap();
    assert!(dom.remove(st, version).unwrap());
    let patched = dom.flush(s).unwrap().to_vec();

    let mut fresh = Dom::new();
    let f = fresh.new_stream();
    let st = fresh.new_struct();
    let one = fresh.new_scalar(1i64).unwrap();
    let three = fresh.new_scalar(3i64).unwrap();
    fresh.add_field(st, "name", one).unwrap();
    fresh.add_field(st, "imports", three).unwrap();
    fresh.add(f, st).unwrap();
    assert_eq!(fresh.flush(f).unwrap(), patched.as_slice());
    assert_eq!(patched, stream(&[0xd6, 0x84, 0x21, 0x01, 0x86, 0x21, 0x03]));
}

fn fresh_stream(build: impl FnOnce(&mut Dom, ValueId)) -> Vec<u8> {
    let mut dom = Dom::new();
    let s = dom.new_stream();
    build(&mut dom, s);
    dom.flush(s).unwrap().to_vec()
}

#[test]
fn null_and_cleared_containers_drop_their_old_payload() {
    init_tracing();
    let input = stream(&[
        0xb4, 0x21, 0x01, 0x21, 0x02, 0xc2, 0x21, 0x03, 0x21, 0x07,
    ]);
    let mut dom = Dom::new();
    let s = dom.load(input).unwrap();
    let list = dom.get(s, 0).unwrap();
    let sexp = dom.get(s, 1).unwrap();
    let seven = dom.get(s, 2).unwrap();
    let first = dom.get(list, 0).unwrap();

    dom.make_null(list).unwrap();
    dom.clear(sexp).unwrap();
    let patched = dom.flush(s).unwrap().to_vec();
    assert_eq!(patched, stream(&[0xbf, 0xc0, 0x21, 0x07]));
    assert_eq!(dom.position(seven).unwrap().map(|p| p.entry_start), Some(6));
    assert_eq!(dom.container_of(first).unwrap(), None);

    let expected = fresh_stream(|dom, s| {
        let list = dom.new_null_container(ContainerKind::List).unwrap();
        let sexp = dom.new_sexp();
        let seven = dom.new_scalar(7i64).unwrap();
        for v in [list, sexp, seven] {
            dom.add(s, v).unwrap();
        }
    });
    assert_eq!(patched, expected);
}

#[test]
fn header_shrinks_out_of_varuint_length() {
    init_tracing();
    let mut values = vec![0xbe, 0x8f];
    for n in 1..=7 {
        values.extend_from_slice(&[0x21, n]);
    }
    values.push(0x20);
    values.extend_from_slice(&[0x21, 0x09]);

    let mut dom = Dom::new();
    let s = dom.load(stream(&values)).unwrap();
    let list = dom.get(s, 0).unwrap();
    let nine = dom.get(s, 1).unwrap();
    assert_eq!(dom.position(nine).unwrap().map(|p| p.entry_start), Some(21));
    for _ in 0..2 {
        let first = dom.get(list, 0).unwrap();
        dom.remove(list, first).unwrap();
    }
    let third = dom.get(list, 0).unwrap();
    let patched = dom.flush(s).unwrap().to_vec();

    assert_eq!(patched[4], 0xbb);
    assert_eq!(dom.position(list).unwrap().map(|p| p.header_len()), Some(1));
    assert_eq!(dom.position(third).unwrap().map(|p| p.entry_start), Some(5));
    assert_eq!(dom.position(nine).unwrap().map(|p| p.entry_start), Some(16));
    assert_eq!(entry(&dom, s, nine), &[0x21, 0x09]);

    let expected = fresh_stream(|dom, s| {
        let list = dom.new_list();
        for n in [3i64, 4, 5, 6, 7, 0] {
            let v = dom.new_scalar(n).unwrap();
            dom.add(list, v).unwrap();
        }
        let nine = dom.new_scalar(9i64).unwrap();
        dom.add(s, list).unwrap();
        dom.add(s, nine).unwrap();
    });
    assert_eq!(patched, expected);
}

#[test]
fn moving_a_value_between_streams() {
    init_tracing();
    let mut dom = Dom::new();
    let a = dom.load(stream(&[0xb4, 0x21, 0x01, 0x21, 0x02])).unwrap();
    let b = dom.load(stream(&[0xc0])).unwrap();
    let list = dom.get(a, 0).unwrap();
    let sexp = dom.get(b, 0).unwrap();
    let two = dom.get(list, 1).unwrap();

    dom.remove(list, two).unwrap();
    dom.add(sexp, two).unwrap();
    assert_eq!(
        dom.flush(a).unwrap(),
        stream(&[0xb2, 0x21, 0x01]).as_slice()
    );
    assert_eq!(
        dom.flush(b).unwrap(),
        stream(&[0xc2, 0x21, 0x02]).as_slice()
    );
}

#[test]
fn repeated_flushes_are_stable() {
    init_tracing();
    let mut dom = Dom::new();
    let s = dom.new_stream();
    let list = dom.new_list();
    dom.add(s, list).unwrap();
    for i in 0..20i64 {
        let v = dom.new_scalar(i * 1000).unwrap();
        dom.add(list, v).unwrap();
        let once = dom.flush(s).unwrap().to_vec();
        let twice = dom.flush(s).unwrap().to_vec();
        assert_eq!(once, twice);
    }
    assert_eq!(dom.size(list).unwrap(), 20);
}

#[derive(Debug, Clone)]
enum Tree {
    Int(i64),
    Text(String),
    Sym(String),
    List(Vec<Tree>),
    Sexp(Vec<Tree>),
    Struct(Vec<(String, Tree)>),
}

fn tree_strategy() -> impl Strategy<Value = Tree> {
    let leaf = prop_oneof![
        any::<i32>().prop_map(|n| Tree::Int(n as i64)),
        "[a-z]{0,20}".prop_map(Tree::Text),
        "[a-z]{1,6}".prop_map(Tree::Sym),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Tree::List),
            prop::collection::vec(inner.clone(), 0..6).prop_map(Tree::Sexp),
            prop::collection::vec(("[a-c]{1,2}", inner), 0..6).prop_map(Tree::Struct),
        ]
    })
}

fn build(dom: &mut Dom, tree: &Tree) -> ValueId {
    match tree {
        Tree::Int(n) => dom.new_scalar(*n).unwrap(),
        Tree::Text(s) => dom.new_scalar(s.as_str()).unwrap(),
        Tree::Sym(s) => dom.new_symbol(s.as_str()),
        Tree::List(items) | Tree::Sexp(items) => {
            let c = if matches!(tree, Tree::List(_)) {
                dom.new_list()
            } else {
                dom.new_sexp()
            };
            for item in items {
                let child = build(dom, item);
                dom.add(c, child).unwrap();
            }
            c
        }
        Tree::Struct(fields) => {
            let c = dom.new_struct();
            for (name, item) in fields {
                let child = build(dom, item);
                dom.add_field(c, name, child).unwrap();
            }
            c
        }
    }
}

fn build_stream(dom: &mut Dom, trees: &[Tree]) -> ValueId {
    let s = dom.new_stream();
    for tree in trees {
        let v = build(dom, tree);
        dom.add(s, v).unwrap();
    }
    s
}

proptest! {
    #[test]
    fn flushed_trees_reload_and_reflush_identically(
        trees in prop::collection::vec(tree_strategy(), 1..4),
    ) {
        let mut dom = Dom::new();
        let s = build_stream(&mut dom, &trees);
        let bytes = dom.flush(s).unwrap().to_vec();
        let json = dom.to_json(s).unwrap();

        let mut again = Dom::new();
        let b = build_stream(&mut again, &trees);
        prop_assert_eq!(again.flush(b).unwrap(), bytes.as_slice());

        let mut reloaded = Dom::new();
        let r = reloaded.load(bytes.clone()).unwrap();
        reloaded.deep_materialize(r).unwrap();
        prop_assert_eq!(reloaded.to_json(r).unwrap(), json);

        // dirty the stream without changing its contents
        let extra = reloaded.new_scalar(0i64).unwrap();
        reloaded.add(r, extra).unwrap();
        reloaded.remove(r, extra).unwrap();
        prop_assert_eq!(reloaded.flush(r).unwrap(), bytes.as_slice());
    }
}
