use ion_tree::{Dom, IonError, ValueId};
use proptest::prelude::*;

fn list_of(dom: &mut Dom, n: usize) -> (ValueId, Vec<ValueId>) {
    let list = dom.new_list();
    let items: Vec<_> = (0..n).map(|i| dom.new_scalar(i as i64).unwrap()).collect();
    for &item in &items {
        dom.add(list, item).unwrap();
    }
    (list, items)
}

#[test]
fn remove_then_continue() {
    let mut dom = Dom::new();
    let (list, v) = list_of(&mut dom, 3);
    let mut c = dom.cursor(list).unwrap();
    assert_eq!(c.next(&dom).unwrap(), Some(v[0]));
    c.remove(&mut dom).unwrap();
    assert_eq!(c.next(&dom).unwrap(), Some(v[1]));
    assert_eq!(c.next(&dom).unwrap(), Some(v[2]));
    assert_eq!(c.next(&dom).unwrap(), None);

    assert_eq!(dom.size(list).unwrap(), 2);
    assert_eq!(dom.element_id(v[1]).unwrap(), 0);
    assert_eq!(dom.element_id(v[2]).unwrap(), 1);
    assert_eq!(dom.container_of(v[0]).unwrap(), None);
}

#[test]
fn insert_before_current_is_followed() {
    let mut dom = Dom::new();
    let (list, v) = list_of(&mut dom, 3);
    let mut c = dom.cursor(list).unwrap();
    assert_eq!(c.next(&dom).unwrap(), Some(v[0]));
    let x = dom.new_scalar(99i64).unwrap();
    dom.insert(list, 0, x).unwrap();
    assert_eq!(c.next(&dom).unwrap(), Some(v[1]));
    assert_eq!(c.previous(&dom).unwrap(), Some(v[1]));
    assert_eq!(c.previous(&dom).unwrap(), Some(v[0]));
    assert_eq!(c.previous(&dom).unwrap(), Some(x));
}

#[test]
fn cursor_over_a_lazy_stream() {
    let mut dom = Dom::new();
    let s = dom
        .load(vec![0xe0, 0x01, 0x00, 0xea, 0x21, 0x01, 0xb0, 0x81, b'z'])
        .unwrap();
    let mut c = dom.cursor(s).unwrap();
    let mut types = Vec::new();
    while let Some(id) = c.next(&dom).unwrap() {
        types.push(dom.ion_type(id).unwrap().name());
        assert!(!dom.has_native_value(id).unwrap());
    }
    assert_eq!(types, ["int", "list", "string"]);

    let last = c.previous(&dom).unwrap().unwrap();
    c.remove(&mut dom).unwrap();
    assert_eq!(dom.container_of(last).unwrap(), None);
    assert_eq!(
        dom.flush(s).unwrap(),
        [0xe0, 0x01, 0x00, 0xea, 0x21, 0x01, 0xb0].as_slice()
    );
}

#[test]
fn clearing_under_a_cursor() {
    let mut dom = Dom::new();
    let (list, _) = list_of(&mut dom, 3);
    let mut c = dom.cursor(list).unwrap();
    c.next(&dom).unwrap();
    dom.clear(list).unwrap();
    assert_eq!(c.next(&dom), Err(IonError::ConcurrentModification));

    let mut fresh = dom.cursor(list).unwrap();
    assert!(!fresh.has_next(&dom).unwrap());
    assert_eq!(fresh.next_index(&dom).unwrap(), 0);
}

proptest! {
    #[test]
    fn resync_tracks_the_current_element(
        n in 1usize..10,
        steps in 1usize..10,
        at in 0usize..10,
        insert in any::<bool>(),
    ) {
        let steps = steps.min(n);
        let mut dom = Dom::new();
        let (list, v) = list_of(&mut dom, n);
        let mut c = dom.cursor(list).unwrap();
        for i in 0..steps {
            prop_assert_eq!(c.next(&dom).unwrap(), Some(v[i]));
        }

        // mutate strictly before the current element
        let current = steps - 1;
        if insert {
            let x = dom.new_scalar(-1i64).unwrap();
            dom.insert(list, at % (current + 1), x).unwrap();
        } else if current > 0 {
            dom.remove(list, v[at % current]).unwrap();
        }

        let next = c.next(&dom).unwrap();
        prop_assert_eq!(next, v.get(steps).copied());
        let expected_index = match next {
            Some(id) => dom.element_id(id).unwrap() + 1,
            None => dom.size(list).unwrap(),
        };
        prop_assert_eq!(c.next_index(&dom).unwrap(), expected_index);
    }
}
