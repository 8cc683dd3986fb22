//! Collector cooperation.
//!
//! The engine reports its stack top before every call into the runtime
//! that may allocate. Between two reports the live region `[top, capacity)`
//! is what a collection must scan.

use lama_runtime::Collector;

use crate::stack::Stack;

impl Stack {
    /// Report the current top if it moved since the last report.
    #[inline]
    pub fn gc_sync<C: Collector + ?Sized>(&mut self, gc: &mut C) {
        if self.dirty {
            gc.report_stack_top(self.top);
            self.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lama_common_core::Mode;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        reports: Vec<usize>,
    }

    impl Collector for Recorder {
        fn report_stack_top(&mut self, top: usize) {
            self.reports.push(top);
        }
    }

    #[test]
    fn test_sync_reports_only_moves() {
        let mut s = Stack::new(8);
        let mut gc = Recorder::default();
        s.gc_sync(&mut gc);
        s.gc_sync(&mut gc);
        s.push_int(1).unwrap();
        s.gc_sync(&mut gc);
        s.pop(Mode::Opaque).unwrap();
        s.gc_sync(&mut gc);
        assert_eq!(gc.reports, vec![8, 7, 8]);
    }
}
