#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use zeroipc::structures::Stack;
use zeroipc::Error;

#[test]
fn pops_in_reverse_push_order() {
    let segment = make_segment(1024 * 1024);
    let stack = Stack::<u32>::create(&segment, "s", 8).unwrap();
    for v in [1, 2, 3, 4] {
        stack.push(v).unwrap();
    }
    let mut popped = Vec::new();
    while let Ok(v) = stack.pop() {
        popped.push(v);
    }
    assert_eq!(popped, vec![4, 3, 2, 1]);
}

#[test]
fn capacity_one_stack_fills_after_one_push() {
    let segment = make_segment(1024 * 1024);
    let stack = Stack::<u32>::create(&segment, "s", 1).unwrap();
    stack.push(7).unwrap();
    assert!(matches!(stack.push(8), Err(Error::Full)));
    assert_eq!(stack.pop().unwrap(), 7);
}

#[test]
fn pop_on_empty_stack_is_empty_error() {
    let segment = make_segment(1024 * 1024);
    let stack = Stack::<u32>::create(&segment, "s", 4).unwrap();
    assert!(matches!(stack.pop(), Err(Error::Empty)));
}

#[test]
fn peek_does_not_remove_the_top_element() {
    let segment = make_segment(1024 * 1024);
    let stack = Stack::<u32>::create(&segment, "s", 4).unwrap();
    stack.push(9).unwrap();
    assert_eq!(stack.peek(), Some(9));
    assert_eq!(stack.peek(), Some(9));
    assert_eq!(stack.pop().unwrap(), 9);
    assert_eq!(stack.peek(), None);
}
