use super::*;
use RenderStatus::*;

const ALL: [RenderStatus; 11] = [
    Quiescent,
    Initializing,
    Rendering,
    Paused,
    Waiting,
    Completed,
    Canceled,
    Aborted,
    Failed,
    Disposed,
    Deleted,
];

#[test]
fn main_path_is_allowed() {
    assert!(Quiescent.can_transition_to(Initializing));
    assert!(Initializing.can_transition_to(Rendering));
    for end in [Completed, Canceled, Aborted, Failed] {
        assert!(Rendering.can_transition_to(end));
        assert!(Paused.can_transition_to(end));
        assert!(end.can_transition_to(Initializing), "{end:?} should allow a re-render");
    }
}

#[test]
fn side_states_only_hang_off_rendering() {
    assert!(Rendering.can_transition_to(Paused));
    assert!(Paused.can_transition_to(Rendering));
    assert!(Rendering.can_transition_to(Waiting));
    assert!(Waiting.can_transition_to(Rendering));
    assert!(!Quiescent.can_transition_to(Paused));
    assert!(!Completed.can_transition_to(Paused));
    assert!(!Paused.can_transition_to(Waiting));
}

#[test]
fn no_shortcuts_out_of_quiescent() {
    assert!(!Quiescent.can_transition_to(Rendering));
    assert!(!Quiescent.can_transition_to(Completed));
    assert!(!Completed.can_transition_to(Canceled));
}

#[test]
fn teardown_is_irreversible() {
    for s in ALL {
        if s != Deleted {
            assert!(s.can_transition_to(Disposed) || s == Disposed);
        }
    }
    for s in ALL {
        assert_eq!(Disposed.can_transition_to(s), s == Deleted);
        assert!(!Deleted.can_transition_to(s));
    }
}

#[test]
fn classes_partition_the_states() {
    for s in ALL {
        let classes = [s.is_terminal(), s.is_active(), s.is_torn_down()]
            .iter()
            .filter(|b| **b)
            .count();
        let expected = usize::from(s != Quiescent);
        assert_eq!(classes, expected, "{s:?}");
    }
}
