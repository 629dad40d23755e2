// File: crates/storm-hosts/src/deferred.rs
// Description: Cancellable, externally-driven async value
// Not a Future: progress only happens when something calls `execute`,
// which is how the whole core stays synchronous and single-threaded.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Mutually exclusive lifecycle of a [`Deferred`]. Once non-pending, the
/// deferred never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredStatus {
    Pending,
    Resolved,
    Rejected,
    Canceled,
}

impl DeferredStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, DeferredStatus::Pending)
    }
}

type Continuation<T> = Box<dyn FnMut(&T)>;
type Executable<T> = Box<dyn FnMut(&Deferred<T>, f32)>;

struct Inner<T> {
    status: DeferredStatus,
    value: Option<T>,
    on_resolve: Vec<Continuation<T>>,
    on_reject: Vec<Continuation<T>>,
    on_cancel: Vec<Continuation<T>>,
    executable: Option<Executable<T>>,
}

/// A cancellable, externally-driven async value.
///
/// `Deferred` is a cheap-to-clone handle (it shares state via `Rc<RefCell<_>>`),
/// so the same pending value can be held by its owner, captured by
/// [`all`], and captured by event-bus callbacks all at once - exactly the
/// cyclic-reference shape the design calls for: owners hold it, observers
/// hold a clone, nobody holds a parent back-reference.
///
/// Not `Send`/`Sync` by design: every resolve/reject/cancel/execute call
/// happens on the single update thread (see the concurrency model).
pub struct Deferred<T>(Rc<RefCell<Inner<T>>>);

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred(self.0.clone())
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("status", &self.status()).finish()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// A fresh pending deferred with no driver.
    pub fn pending() -> Self {
        Deferred(Rc::new(RefCell::new(Inner {
            status: DeferredStatus::Pending,
            value: None,
            on_resolve: Vec::new(),
            on_reject: Vec::new(),
            on_cancel: Vec::new(),
            executable: None,
        })))
    }

    /// A pending deferred driven by `executable(self, delta_ms)`, called
    /// once per [`Deferred::execute`] while still pending. The executable
    /// is handed a clone of the handle so it can call `resolve`/`reject`/
    /// `cancel` on it directly.
    pub fn with_executable(executable: impl FnMut(&Deferred<T>, f32) + 'static) -> Self {
        let d = Self::pending();
        d.0.borrow_mut().executable = Some(Box::new(executable));
        d
    }

    /// Already-resolved deferred, for synchronously satisfying an
    /// `all()` slot with a plain value rather than a pending async one.
    pub fn resolved(value: T) -> Self {
        let d = Self::pending();
        d.resolve(value);
        d
    }

    pub fn status(&self) -> DeferredStatus {
        self.0.borrow().status
    }

    pub fn is_pending(&self) -> bool {
        self.status().is_pending()
    }

    pub fn is_resolved(&self) -> bool {
        self.status() == DeferredStatus::Resolved
    }

    pub fn is_rejected(&self) -> bool {
        self.status() == DeferredStatus::Rejected
    }

    pub fn is_canceled(&self) -> bool {
        self.status() == DeferredStatus::Canceled
    }

    /// Registers a continuation run (synchronously) when this deferred
    /// resolves. Runs immediately if already resolved.
    pub fn on_resolve(&self, mut cb: impl FnMut(&T) + 'static) {
        let mut inner = self.0.borrow_mut();
        if inner.status == DeferredStatus::Resolved {
            if let Some(v) = &inner.value {
                cb(v);
            }
            drop(inner);
        } else {
            inner.on_resolve.push(Box::new(cb));
        }
    }

    pub fn on_reject(&self, cb: impl FnMut(&T) + 'static) {
        self.0.borrow_mut().on_reject.push(Box::new(cb));
    }

    pub fn on_cancel(&self, cb: impl FnMut(&T) + 'static) {
        self.0.borrow_mut().on_cancel.push(Box::new(cb));
    }

    /// Resolves with `value`. No-op if no longer pending.
    pub fn resolve(&self, value: T) {
        self.settle(DeferredStatus::Resolved, value, |inner| &mut inner.on_resolve);
    }

    /// Rejects with `value`. No-op if no longer pending.
    pub fn reject(&self, value: T) {
        self.settle(DeferredStatus::Rejected, value, |inner| &mut inner.on_reject);
    }

    /// Cancels with `value`. No-op if no longer pending.
    pub fn cancel(&self, value: T) {
        self.settle(DeferredStatus::Canceled, value, |inner| &mut inner.on_cancel);
    }

    fn settle(
        &self,
        status: DeferredStatus,
        value: T,
        continuations: impl Fn(&mut Inner<T>) -> &mut Vec<Continuation<T>>,
    ) {
        let (mut cbs, value) = {
            let mut inner = self.0.borrow_mut();
            if !inner.status.is_pending() {
                return;
            }
            inner.status = status;
            inner.value = Some(value.clone());
            inner.executable = None;
            (std::mem::take(continuations(&mut inner)), value)
        };
        // Callbacks run with the borrow released: a callback may itself
        // touch this deferred (e.g. read `.value()`), and re-entrant
        // `resolve`/`reject`/`cancel` calls on an already-settled deferred
        // are no-ops.
        for mut cb in cbs.drain(..) {
            cb(&value);
        }
    }

    /// Progresses the driver callback by `delta_ms`, if any and if still
    /// pending. A no-op once resolved/rejected/canceled.
    pub fn execute(&self, delta_ms: f32) {
        if !self.is_pending() {
            return;
        }
        let exec = self.0.borrow_mut().executable.take();
        if let Some(mut exec) = exec {
            exec(self, delta_ms);
            if self.is_pending() {
                self.0.borrow_mut().executable = Some(exec);
            }
        }
    }

    /// Returns the settled value, if any.
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.0.borrow().value.clone()
    }
}

/// Resolves when every member resolves, with the ordered resolution
/// values; rejects/cancels the whole group as soon as any member
/// rejects/cancels. Cancelling the returned deferred cancels every
/// still-pending member.
pub fn all<T: Clone + 'static>(members: Vec<Deferred<T>>) -> Deferred<Vec<T>> {
    let result = Deferred::pending();
    let total = members.len();
    if total == 0 {
        result.resolve(Vec::new());
        return result;
    }

    let collected: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; total]));
    let remaining = Rc::new(RefCell::new(total));

    for (i, member) in members.iter().enumerate() {
        let collected = collected.clone();
        let remaining = remaining.clone();
        let result_for_resolve = result.clone();
        member.on_resolve(move |v: &T| {
            collected.borrow_mut()[i] = Some(v.clone());
            let left = {
                let mut r = remaining.borrow_mut();
                *r -= 1;
                *r
            };
            if left == 0 {
                let values = collected.borrow_mut().drain(..).map(|o| o.expect("filled")).collect();
                result_for_resolve.resolve(values);
            }
        });

        let result_for_reject = result.clone();
        member.on_reject(move |v: &T| {
            result_for_reject.reject(v.clone());
        });

        let result_for_cancel = result.clone();
        member.on_cancel(move |v: &T| {
            result_for_cancel.cancel(v.clone());
        });
    }

    let members_for_propagation = members;
    result.on_cancel(move |v: &Vec<T>| {
        let fallback = v.first().cloned();
        for m in &members_for_propagation {
            if m.is_pending() {
                if let Some(v0) = fallback.clone() {
                    m.cancel(v0);
                }
            }
        }
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_idempotent_and_synchronous() {
        let d: Deferred<i32> = Deferred::pending();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        d.on_resolve(move |v| seen2.borrow_mut().push(*v));
        d.resolve(1);
        d.resolve(2);
        assert_eq!(*seen.borrow(), vec![1]);
        assert!(d.is_resolved());
    }

    #[test]
    fn execute_is_noop_once_settled() {
        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        let d: Deferred<i32> = Deferred::with_executable(move |d, _delta| {
            *calls2.borrow_mut() += 1;
            d.resolve(42);
        });
        d.execute(16.0);
        d.execute(16.0);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(d.value(), Some(42));
    }

    #[test]
    fn all_resolves_with_ordered_values() {
        let a: Deferred<i32> = Deferred::pending();
        let b: Deferred<i32> = Deferred::pending();
        let c: Deferred<i32> = Deferred::resolved(3);
        let group = all(vec![a.clone(), b.clone(), c]);
        assert!(group.is_pending());
        b.resolve(2);
        assert!(group.is_pending());
        a.resolve(1);
        assert_eq!(group.value(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn all_rejects_group_when_any_member_rejects() {
        let a: Deferred<i32> = Deferred::pending();
        let b: Deferred<i32> = Deferred::pending();
        let group = all(vec![a.clone(), b.clone()]);
        b.reject(-1);
        assert!(group.is_rejected());
    }

    #[test]
    fn cancelling_all_cancels_pending_members() {
        let a: Deferred<i32> = Deferred::pending();
        let b: Deferred<i32> = Deferred::pending();
        let group = all(vec![a.clone(), b.clone()]);
        group.cancel(vec![0]);
        assert!(a.is_canceled());
        assert!(b.is_canceled());
    }
}
