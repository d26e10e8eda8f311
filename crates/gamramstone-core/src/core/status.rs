//! Work-Status Rules
//!
//! Pure predicates deciding who may act on a caption track. The same
//! predicates gate what a frontend offers and are re-checked by the apply
//! service before anything is mutated.

use super::models::WorkStatus;
use super::session::Role;
use super::settings::RemoteSettings;

/// Returns true when `role` may start an apply on a track in `status`.
///
/// Only viewers are locked out, and only while the track is `wip`.
pub fn can_initiate_apply(role: Role, status: WorkStatus) -> bool {
    role.is_privileged() || matches!(status, WorkStatus::Waiting | WorkStatus::Done)
}

/// Returns true when the track's title, description and files may be shown.
pub fn can_view_contents(role: Role, status: WorkStatus) -> bool {
    can_initiate_apply(role, status)
}

/// Returns true when the automatic apply action is offered at all.
pub fn can_show_apply_button(settings: &RemoteSettings, role: Role) -> bool {
    !settings.hide_apply_button || role == Role::Admin
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Role; 3] = [Role::Viewer, Role::Translator, Role::Admin];
    const STATUSES: [WorkStatus; 3] = [WorkStatus::Waiting, WorkStatus::Wip, WorkStatus::Done];

    #[test]
    fn test_can_initiate_apply_truth_table() {
        for role in ROLES {
            for status in STATUSES {
                let expected = !(role == Role::Viewer && status == WorkStatus::Wip);
                assert_eq!(
                    can_initiate_apply(role, status),
                    expected,
                    "role={} status={}",
                    role,
                    status
                );
            }
        }
    }

    #[test]
    fn test_contents_follow_apply_rule() {
        assert!(!can_view_contents(Role::Viewer, WorkStatus::Wip));
        assert!(can_view_contents(Role::Translator, WorkStatus::Wip));
    }

    #[test]
    fn test_hidden_apply_button_only_for_admin() {
        let visible = RemoteSettings::default();
        assert!(can_show_apply_button(&visible, Role::Viewer));

        let hidden = RemoteSettings {
            hide_apply_button: true,
            ..RemoteSettings::default()
        };
        assert!(!can_show_apply_button(&hidden, Role::Viewer));
        assert!(!can_show_apply_button(&hidden, Role::Translator));
        assert!(can_show_apply_button(&hidden, Role::Admin));
    }
}
