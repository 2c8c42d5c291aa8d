use crate::error::AppError;
use crate::models::department::{Department, DepartmentSupervisor};
use crate::models::report::{Report, ReportMessage, ReportStatus};
use mongodb::bson::DateTime;

pub const ACCEPT_DEFAULT_MESSAGE: &str = "Verified and Accepted";

/// Role facts derived for one actor against the current reference snapshot.
/// An actor may hold several roles at once (an officer can also head a
/// department); each transition checks the one it needs.
#[derive(Clone, Debug)]
pub struct ActorProfile {
    pub emp_code: i32,
    pub name: String,
    pub officer: bool,
    pub chief_of: Option<Department>,
    pub supervisor: bool,
}

impl ActorProfile {
    fn heads(&self, dept_code: &str) -> bool {
        self.chief_of
            .as_ref()
            .map_or(false, |d| d.dept_code == dept_code)
    }
}

#[derive(Clone, Debug)]
pub enum WorkflowAction {
    Assign {
        department: Department,
        message: String,
    },
    Reassign {
        department: Department,
        message: String,
    },
    Delegate {
        supervisor: DepartmentSupervisor,
        message: String,
    },
    MarkComplete {
        message: String,
    },
    Accept {
        message: Option<String>,
    },
    Reject {
        message: String,
    },
}

/// Compute the next report document for one workflow action, or fail without
/// side effects. Checks run in a fixed order: terminal state, state/action
/// match, actor role, input validation. Every permitted transition bumps
/// `version` and appends exactly one message.
pub fn advance(
    report: &Report,
    actor: &ActorProfile,
    action: WorkflowAction,
    now: DateTime,
) -> Result<Report, AppError> {
    if report.completed || report.status == ReportStatus::Completed {
        return Err(AppError::Forbidden("REPORT_ALREADY_COMPLETED"));
    }

    match (report.status, action) {
        (ReportStatus::Pending, WorkflowAction::Assign { department, message }) => {
            if !actor.officer {
                return Err(AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
            }

            let mut next = begin(report, actor, message, now);
            next.status = ReportStatus::Assigned;
            next.assigned_department = department.dept_code;
            push_recipient(&mut next.send_to, department.chief_code);
            Ok(next)
        }
        (ReportStatus::Assigned, WorkflowAction::Reassign { department, message }) => {
            if !actor.officer {
                return Err(AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
            }
            let message = require_message(message, "REASSIGN_MESSAGE_REQUIRED")?;
            if department.dept_code == report.assigned_department {
                return Err(AppError::Validation("DEPARTMENT_MUST_DIFFER"));
            }

            let mut next = begin(report, actor, message, now);
            next.assigned_department = department.dept_code;
            // Reassignment revokes the prior assignees' visibility: the inbox
            // set is replaced with a fresh singleton, not grown by union.
            next.send_to = vec![department.chief_code];
            Ok(next)
        }
        (ReportStatus::Assigned, WorkflowAction::Delegate { supervisor, message }) => {
            if !actor.heads(&report.assigned_department) {
                return Err(AppError::Forbidden("CHIEF_ROLE_REQUIRED"));
            }
            let roster = actor
                .chief_of
                .as_ref()
                .map_or(false, |d| d.supervisors.contains(&supervisor));
            if !roster {
                return Err(AppError::Validation("SUPERVISOR_NOT_IN_DEPARTMENT"));
            }

            let mut next = begin(report, actor, message.clone(), now);
            next.status = ReportStatus::Rectifying;
            next.assigned_supervisor = supervisor.name;
            next.chief_comment = message;
            push_recipient(&mut next.send_to, supervisor.emp_code);
            Ok(next)
        }
        (ReportStatus::Assigned, WorkflowAction::MarkComplete { message }) => {
            if !actor.heads(&report.assigned_department) {
                return Err(AppError::Forbidden("CHIEF_ROLE_REQUIRED"));
            }

            let mut next = begin(report, actor, message.clone(), now);
            next.status = ReportStatus::Verifying;
            next.completed_at = Some(now);
            next.rectified_by = actor.name.clone();
            next.chief_comment = message;
            Ok(next)
        }
        (ReportStatus::Assigned, WorkflowAction::Reject { message }) => {
            // Only the officer branch exists here; a chief has no supervisor
            // work to send back yet.
            if !actor.officer {
                return Err(AppError::Forbidden("TRANSITION_NOT_ALLOWED"));
            }
            let message = require_message(message, "REJECT_MESSAGE_REQUIRED")?;

            let mut next = begin(report, actor, format!("Rejected: {message}"), now);
            next.status = ReportStatus::Pending;
            clear_routing(&mut next);
            Ok(next)
        }
        (ReportStatus::Rectifying, WorkflowAction::MarkComplete { message }) => {
            if !actor.supervisor || !report.send_to.contains(&actor.emp_code) {
                return Err(AppError::Forbidden("SUPERVISOR_ROLE_REQUIRED"));
            }

            let mut next = begin(report, actor, message.clone(), now);
            next.status = ReportStatus::Verifying;
            next.completed_at = Some(now);
            next.rectified_by = actor.name.clone();
            next.supervisor_comment = message;
            Ok(next)
        }
        (ReportStatus::Rectifying, WorkflowAction::Reject { message }) => {
            if !actor.heads(&report.assigned_department) {
                return Err(AppError::Forbidden("CHIEF_ROLE_REQUIRED"));
            }
            let message = require_message(message, "REJECT_MESSAGE_REQUIRED")?;

            let mut next = begin(report, actor, format!("Rejected by Chief: {message}"), now);
            next.status = ReportStatus::Pending;
            clear_routing(&mut next);
            Ok(next)
        }
        (ReportStatus::Verifying, WorkflowAction::Accept { message }) => {
            if !actor.officer && !actor.heads(&report.assigned_department) {
                return Err(AppError::Forbidden("VERIFIER_ROLE_REQUIRED"));
            }
            let message = match message {
                Some(message) if !message.trim().is_empty() => message,
                _ => ACCEPT_DEFAULT_MESSAGE.to_string(),
            };

            let mut next = begin(report, actor, message, now);
            next.status = ReportStatus::Completed;
            next.completed = true;
            Ok(next)
        }
        (ReportStatus::Verifying, WorkflowAction::Reject { message }) => {
            if !actor.officer && !actor.heads(&report.assigned_department) {
                return Err(AppError::Forbidden("VERIFIER_ROLE_REQUIRED"));
            }
            let message = require_message(message, "REJECT_MESSAGE_REQUIRED")?;

            let mut next = begin(report, actor, message, now);
            next.status = ReportStatus::Rectifying;
            Ok(next)
        }
        _ => Err(AppError::Forbidden("TRANSITION_NOT_ALLOWED")),
    }
}

fn begin(report: &Report, actor: &ActorProfile, message: String, now: DateTime) -> Report {
    let mut next = report.clone();
    next.version += 1;
    next.messages.push(ReportMessage {
        id: actor.emp_code,
        message,
        timestamp: now,
    });
    next
}

fn require_message(message: String, failure: &'static str) -> Result<String, AppError> {
    if message.trim().is_empty() {
        Err(AppError::Validation(failure))
    } else {
        Ok(message)
    }
}

fn push_recipient(send_to: &mut Vec<i32>, emp_code: i32) {
    if !send_to.contains(&emp_code) {
        send_to.push(emp_code);
    }
}

/// A report sent back to `pending` is re-triaged from scratch: nobody owns
/// the next action until an officer assigns it again.
fn clear_routing(next: &mut Report) {
    next.assigned_department.clear();
    next.assigned_supervisor.clear();
    next.chief_comment.clear();
    next.supervisor_comment.clear();
    next.completed_at = None;
    next.rectified_by.clear();
    next.send_to.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_684_108_800_000;

    fn now() -> DateTime {
        DateTime::from_millis(NOW)
    }

    fn maintenance() -> Department {
        Department {
            _id: None,
            dept_code: "MAINT".to_string(),
            dept_name: "Maintenance".to_string(),
            chief_code: 501,
            chief_name: "Asha Verma".to_string(),
            supervisors: vec![DepartmentSupervisor {
                emp_code: 777,
                name: "Joko Susilo".to_string(),
            }],
        }
    }

    fn electrical() -> Department {
        Department {
            _id: None,
            dept_code: "ELEC".to_string(),
            dept_name: "Electrical".to_string(),
            chief_code: 601,
            chief_name: "Rina Hartono".to_string(),
            supervisors: Vec::new(),
        }
    }

    fn officer() -> ActorProfile {
        ActorProfile {
            emp_code: 101,
            name: "Dewi Lestari".to_string(),
            officer: true,
            chief_of: None,
            supervisor: false,
        }
    }

    fn chief() -> ActorProfile {
        ActorProfile {
            emp_code: 501,
            name: "Asha Verma".to_string(),
            officer: false,
            chief_of: Some(maintenance()),
            supervisor: false,
        }
    }

    fn other_chief() -> ActorProfile {
        ActorProfile {
            emp_code: 601,
            name: "Rina Hartono".to_string(),
            officer: false,
            chief_of: Some(electrical()),
            supervisor: false,
        }
    }

    fn supervisor() -> ActorProfile {
        ActorProfile {
            emp_code: 777,
            name: "Joko Susilo".to_string(),
            officer: false,
            chief_of: None,
            supervisor: true,
        }
    }

    fn pending_report() -> Report {
        Report {
            _id: None,
            status: ReportStatus::Pending,
            completed: false,
            version: 0,
            emp_code: 42,
            location: "Dock 4".to_string(),
            description: "Hydraulic oil spill near the loading ramp".to_string(),
            date: now(),
            incident_type: "near_miss".to_string(),
            corrective_action: "Cordon off and clean".to_string(),
            image_url: None,
            assigned_department: String::new(),
            assigned_supervisor: String::new(),
            send_to: Vec::new(),
            messages: Vec::new(),
            completed_at: None,
            rectified_by: String::new(),
            chief_comment: String::new(),
            supervisor_comment: String::new(),
            created_at: now(),
        }
    }

    fn assign(message: &str) -> WorkflowAction {
        WorkflowAction::Assign {
            department: maintenance(),
            message: message.to_string(),
        }
    }

    fn delegate(message: &str) -> WorkflowAction {
        WorkflowAction::Delegate {
            supervisor: DepartmentSupervisor {
                emp_code: 777,
                name: "Joko Susilo".to_string(),
            },
            message: message.to_string(),
        }
    }

    fn assigned_report() -> Report {
        advance(&pending_report(), &officer(), assign("Please review"), now()).unwrap()
    }

    fn rectifying_report() -> Report {
        advance(&assigned_report(), &chief(), delegate("Fix it"), now()).unwrap()
    }

    fn verifying_report() -> Report {
        advance(
            &rectifying_report(),
            &supervisor(),
            WorkflowAction::MarkComplete {
                message: "Done".to_string(),
            },
            now(),
        )
        .unwrap()
    }

    fn mirror_holds(report: &Report) -> bool {
        report.completed == (report.status == ReportStatus::Completed)
    }

    #[test]
    fn officer_assigns_pending_report() {
        let next = assigned_report();

        assert_eq!(next.status, ReportStatus::Assigned);
        assert_eq!(next.assigned_department, "MAINT");
        assert_eq!(next.send_to, vec![501]);
        assert_eq!(next.messages.len(), 1);
        assert_eq!(next.messages[0].id, 101);
        assert_eq!(next.messages[0].message, "Please review");
        assert_eq!(next.version, 1);
        assert!(!next.completed);
    }

    #[test]
    fn assign_requires_officer_role() {
        let result = advance(&pending_report(), &chief(), assign("Please review"), now());
        assert_eq!(result.unwrap_err(), AppError::Forbidden("OFFICER_ROLE_REQUIRED"));
    }

    #[test]
    fn full_approval_lifecycle() {
        // Officer 101 assigns to Maintenance (chief 501).
        let report = assigned_report();
        assert_eq!(report.status, ReportStatus::Assigned);
        assert_eq!(report.send_to, vec![501]);
        assert_eq!(report.messages.len(), 1);
        assert!(mirror_holds(&report));

        // Chief 501 delegates to supervisor 777.
        let report = advance(&report, &chief(), delegate("Fix it"), now()).unwrap();
        assert_eq!(report.status, ReportStatus::Rectifying);
        assert_eq!(report.assigned_supervisor, "Joko Susilo");
        assert!(report.send_to.contains(&777));
        assert!(report.send_to.contains(&501));
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.chief_comment, "Fix it");
        assert!(mirror_holds(&report));

        // Supervisor 777 marks the corrective work complete.
        let report = advance(
            &report,
            &supervisor(),
            WorkflowAction::MarkComplete {
                message: "Done".to_string(),
            },
            now(),
        )
        .unwrap();
        assert_eq!(report.status, ReportStatus::Verifying);
        assert!(report.completed_at.is_some());
        assert_eq!(report.rectified_by, "Joko Susilo");
        assert_eq!(report.supervisor_comment, "Done");
        assert_eq!(report.messages.len(), 3);
        assert!(mirror_holds(&report));

        // Officer accepts without a message; the default text is recorded.
        let report = advance(
            &report,
            &officer(),
            WorkflowAction::Accept { message: None },
            now(),
        )
        .unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
        assert!(report.completed);
        assert_eq!(report.messages.len(), 4);
        assert_eq!(report.messages[3].message, ACCEPT_DEFAULT_MESSAGE);
        assert_eq!(report.version, 4);
        assert!(mirror_holds(&report));

        // Terminal: nothing moves a completed report.
        let result = advance(
            &report,
            &officer(),
            WorkflowAction::Reject {
                message: "Too late".to_string(),
            },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Forbidden("REPORT_ALREADY_COMPLETED")
        );
    }

    #[test]
    fn every_transition_appends_exactly_one_message() {
        let pending = pending_report();
        let assigned = assigned_report();
        let rectifying = rectifying_report();
        let verifying = verifying_report();

        assert_eq!(pending.messages.len(), 0);
        assert_eq!(assigned.messages.len(), 1);
        assert_eq!(rectifying.messages.len(), 2);
        assert_eq!(verifying.messages.len(), 3);

        let completed = advance(
            &verifying,
            &officer(),
            WorkflowAction::Accept { message: None },
            now(),
        )
        .unwrap();
        assert_eq!(completed.messages.len(), 4);
    }

    #[test]
    fn chief_self_completes_assigned_report() {
        let next = advance(
            &assigned_report(),
            &chief(),
            WorkflowAction::MarkComplete {
                message: "Handled directly".to_string(),
            },
            now(),
        )
        .unwrap();

        assert_eq!(next.status, ReportStatus::Verifying);
        assert!(next.completed_at.is_some());
        assert_eq!(next.rectified_by, "Asha Verma");
        assert_eq!(next.chief_comment, "Handled directly");
        assert!(next.supervisor_comment.is_empty());
    }

    #[test]
    fn delegate_requires_heading_the_assigned_department() {
        let result = advance(&assigned_report(), &other_chief(), delegate("Fix it"), now());
        assert_eq!(result.unwrap_err(), AppError::Forbidden("CHIEF_ROLE_REQUIRED"));
    }

    #[test]
    fn delegate_rejects_supervisor_outside_roster() {
        let action = WorkflowAction::Delegate {
            supervisor: DepartmentSupervisor {
                emp_code: 888,
                name: "Made Wira".to_string(),
            },
            message: "Fix it".to_string(),
        };
        let result = advance(&assigned_report(), &chief(), action, now());
        assert_eq!(
            result.unwrap_err(),
            AppError::Validation("SUPERVISOR_NOT_IN_DEPARTMENT")
        );
    }

    #[test]
    fn supervisor_completion_requires_inbox_membership() {
        let outsider = ActorProfile {
            emp_code: 888,
            name: "Made Wira".to_string(),
            officer: false,
            chief_of: None,
            supervisor: true,
        };
        let result = advance(
            &rectifying_report(),
            &outsider,
            WorkflowAction::MarkComplete {
                message: "Done".to_string(),
            },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Forbidden("SUPERVISOR_ROLE_REQUIRED")
        );
    }

    #[test]
    fn officer_reject_at_assigned_restores_pending() {
        let next = advance(
            &assigned_report(),
            &officer(),
            WorkflowAction::Reject {
                message: "Wrong department".to_string(),
            },
            now(),
        )
        .unwrap();

        assert_eq!(next.status, ReportStatus::Pending);
        assert!(next.assigned_department.is_empty());
        assert!(next.send_to.is_empty());
        assert_eq!(next.messages.len(), 2);
        assert_eq!(next.messages[1].message, "Rejected: Wrong department");
    }

    #[test]
    fn chief_reject_at_assigned_is_not_applicable() {
        let result = advance(
            &assigned_report(),
            &chief(),
            WorkflowAction::Reject {
                message: "Not ours".to_string(),
            },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Forbidden("TRANSITION_NOT_ALLOWED")
        );
    }

    #[test]
    fn chief_reject_at_rectifying_restores_pending() {
        let next = advance(
            &rectifying_report(),
            &chief(),
            WorkflowAction::Reject {
                message: "Wrong fix".to_string(),
            },
            now(),
        )
        .unwrap();

        assert_eq!(next.status, ReportStatus::Pending);
        assert!(next.assigned_department.is_empty());
        assert!(next.assigned_supervisor.is_empty());
        assert!(next.chief_comment.is_empty());
        assert!(next.send_to.is_empty());
        assert_eq!(next.messages.len(), 3);
        assert_eq!(next.messages[2].message, "Rejected by Chief: Wrong fix");
    }

    #[test]
    fn verifying_reject_requires_message() {
        let verifying = verifying_report();
        let before = verifying.clone();

        let result = advance(
            &verifying,
            &officer(),
            WorkflowAction::Reject {
                message: "   ".to_string(),
            },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Validation("REJECT_MESSAGE_REQUIRED")
        );

        // Failure leaves the document as it was.
        assert_eq!(verifying.status, before.status);
        assert_eq!(verifying.messages.len(), before.messages.len());
        assert_eq!(verifying.version, before.version);
    }

    #[test]
    fn verifying_reject_returns_to_rectifying() {
        let next = advance(
            &verifying_report(),
            &officer(),
            WorkflowAction::Reject {
                message: "Photo does not show the repair".to_string(),
            },
            now(),
        )
        .unwrap();

        assert_eq!(next.status, ReportStatus::Rectifying);
        assert_eq!(next.messages.len(), 4);
        // The inbox set is untouched; the same people pick the work back up.
        assert!(next.send_to.contains(&501));
        assert!(next.send_to.contains(&777));
        assert!(mirror_holds(&next));
    }

    #[test]
    fn verifying_accept_with_custom_message() {
        let next = advance(
            &verifying_report(),
            &chief(),
            WorkflowAction::Accept {
                message: Some("Checked on site".to_string()),
            },
            now(),
        )
        .unwrap();

        assert_eq!(next.status, ReportStatus::Completed);
        assert!(next.completed);
        assert_eq!(next.messages[3].message, "Checked on site");
    }

    #[test]
    fn verifying_accept_blank_message_defaults() {
        let next = advance(
            &verifying_report(),
            &officer(),
            WorkflowAction::Accept {
                message: Some("  ".to_string()),
            },
            now(),
        )
        .unwrap();
        assert_eq!(next.messages[3].message, ACCEPT_DEFAULT_MESSAGE);
    }

    #[test]
    fn verifying_accept_requires_verifier_role() {
        let result = advance(
            &verifying_report(),
            &supervisor(),
            WorkflowAction::Accept { message: None },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Forbidden("VERIFIER_ROLE_REQUIRED")
        );
    }

    #[test]
    fn reassign_replaces_inbox_with_new_chief() {
        let next = advance(
            &assigned_report(),
            &officer(),
            WorkflowAction::Reassign {
                department: electrical(),
                message: "Belongs to electrical".to_string(),
            },
            now(),
        )
        .unwrap();

        assert_eq!(next.status, ReportStatus::Assigned);
        assert_eq!(next.assigned_department, "ELEC");
        assert_eq!(next.send_to, vec![601]);
        assert_eq!(next.messages.len(), 2);
    }

    #[test]
    fn reassign_requires_different_department() {
        let result = advance(
            &assigned_report(),
            &officer(),
            WorkflowAction::Reassign {
                department: maintenance(),
                message: "Same place".to_string(),
            },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Validation("DEPARTMENT_MUST_DIFFER")
        );
    }

    #[test]
    fn reassign_requires_message() {
        let result = advance(
            &assigned_report(),
            &officer(),
            WorkflowAction::Reassign {
                department: electrical(),
                message: String::new(),
            },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Validation("REASSIGN_MESSAGE_REQUIRED")
        );
    }

    #[test]
    fn actions_at_wrong_state_are_rejected() {
        let result = advance(
            &pending_report(),
            &officer(),
            WorkflowAction::Accept { message: None },
            now(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppError::Forbidden("TRANSITION_NOT_ALLOWED")
        );

        let result = advance(&rectifying_report(), &chief(), delegate("Again"), now());
        assert_eq!(
            result.unwrap_err(),
            AppError::Forbidden("TRANSITION_NOT_ALLOWED")
        );
    }

    #[test]
    fn completed_mirror_tracks_status_through_lifecycle() {
        assert!(mirror_holds(&pending_report()));
        assert!(mirror_holds(&assigned_report()));
        assert!(mirror_holds(&rectifying_report()));
        assert!(mirror_holds(&verifying_report()));

        let completed = advance(
            &verifying_report(),
            &officer(),
            WorkflowAction::Accept { message: None },
            now(),
        )
        .unwrap();
        assert!(mirror_holds(&completed));
    }

    #[test]
    fn recipients_are_never_duplicated() {
        let mut send_to = vec![501];
        push_recipient(&mut send_to, 501);
        push_recipient(&mut send_to, 777);
        push_recipient(&mut send_to, 777);
        assert_eq!(send_to, vec![501, 777]);
    }

    #[test]
    fn resubmission_after_verifying_reject_overwrites_completion_fields() {
        let rejected = advance(
            &verifying_report(),
            &officer(),
            WorkflowAction::Reject {
                message: "Incomplete".to_string(),
            },
            now(),
        )
        .unwrap();

        let later = DateTime::from_millis(NOW + 86_400_000);
        let resubmitted = advance(
            &rejected,
            &supervisor(),
            WorkflowAction::MarkComplete {
                message: "Redone".to_string(),
            },
            later,
        )
        .unwrap();

        assert_eq!(resubmitted.status, ReportStatus::Verifying);
        assert_eq!(resubmitted.completed_at, Some(later));
        assert_eq!(resubmitted.supervisor_comment, "Redone");
        assert_eq!(resubmitted.messages.len(), 5);
    }
}
