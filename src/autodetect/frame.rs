use recursion::{Collapsible, MappableFrame, PartiallyApplied};

use super::{Call, Condition};

/// Single layer of a borrowed [`Condition`], used to fold conditions without
/// recursing on the call stack.
pub enum ConditionFrame<'a, X> {
    AlwaysTrue,
    Or(X, X),
    And(X, X),
    Not(X),
    Call(&'a Call),
}

impl<'a> MappableFrame for ConditionFrame<'a, PartiallyApplied> {
    type Frame<X> = ConditionFrame<'a, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, mut f: impl FnMut(A) -> B) -> Self::Frame<B> {
        match input {
            ConditionFrame::AlwaysTrue => ConditionFrame::AlwaysTrue,
            ConditionFrame::Or(a, b) => ConditionFrame::Or(f(a), f(b)),
            ConditionFrame::And(a, b) => ConditionFrame::And(f(a), f(b)),
            ConditionFrame::Not(a) => ConditionFrame::Not(f(a)),
            ConditionFrame::Call(c) => ConditionFrame::Call(c),
        }
    }
}

impl<'a> Collapsible for &'a Condition {
    type FrameToken = ConditionFrame<'a, PartiallyApplied>;

    fn into_frame(self) -> ConditionFrame<'a, Self> {
        match self {
            Condition::AlwaysTrue => ConditionFrame::AlwaysTrue,
            Condition::Or(a, b) => ConditionFrame::Or(a, b),
            Condition::And(a, b) => ConditionFrame::And(a, b),
            Condition::Not(a) => ConditionFrame::Not(a),
            Condition::Call(c) => ConditionFrame::Call(c),
        }
    }
}
