#[cfg(test)]
mod tests {
    use crate::models::{Frequency, TaskOrigin, TaskStatus};
    use crate::sync::{
        frequency_label, remove_subject_tasks, sync_subject, sync_topic_toggle, target_hours_for,
    };
    use crate::test::utils::{SubjectBuilder, TaskBuilder, date};

    #[test]
    fn in_progress_auto_add_subject_gets_a_task() {
        let subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false), ("Matrices", false)])
            .dates("2025-11-01", "2025-12-15")
            .in_progress()
            .auto_add()
            .completed_hours(1.5)
            .build();
        let mut tasks = Vec::new();

        assert!(sync_subject(&subject, &mut tasks));

        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.subject_id.as_deref(), Some("algebra-id"));
        assert_eq!(task.subject_name, "Algebra");
        assert_eq!(task.topic_names, vec!["Linear equations", "Matrices"]);
        assert_eq!(task.start_date, date("2025-11-01"));
        assert_eq!(task.end_date, date("2025-12-15"));
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.target_hours, 5.0);
        assert_eq!(task.completed_hours, 1.5);
        assert_eq!(task.origin, TaskOrigin::Auto);
        let notes = task.notes.as_deref().expect("generated notes");
        assert!(notes.contains("2 pending topics"), "notes were: {}", notes);
        assert!(notes.contains("Everyday"), "notes were: {}", notes);
    }

    #[test]
    fn target_hours_is_two_per_topic_with_a_five_hour_floor() {
        assert_eq!(target_hours_for(1), 5.0);
        assert_eq!(target_hours_for(2), 5.0);
        assert_eq!(target_hours_for(3), 6.0);
        assert_eq!(target_hours_for(4), 8.0);
    }

    #[test]
    fn subjects_outside_the_sync_condition_get_no_task() {
        let not_started = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false)])
            .status(TaskStatus::NotStarted)
            .auto_add()
            .build();
        let no_auto_add = SubjectBuilder::new("Physics")
            .topics(&[("Optics", false)])
            .in_progress()
            .build();

        let mut tasks = Vec::new();
        assert!(!sync_subject(&not_started, &mut tasks));
        assert!(!sync_subject(&no_auto_add, &mut tasks));
        assert!(tasks.is_empty());
    }

    #[test]
    fn syncing_twice_is_a_no_op() {
        let subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false), ("Matrices", true)])
            .in_progress()
            .auto_add()
            .build();
        let mut tasks = Vec::new();

        assert!(sync_subject(&subject, &mut tasks));
        let snapshot = tasks.clone();

        assert!(!sync_subject(&subject, &mut tasks));
        assert_eq!(tasks, snapshot);
    }

    #[test]
    fn editing_a_subject_updates_the_task_in_place() {
        let subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false), ("Matrices", false)])
            .in_progress()
            .auto_add()
            .build();
        let mut tasks = Vec::new();
        sync_subject(&subject, &mut tasks);
        let task_id = tasks[0].id.clone();
        tasks[0].status = TaskStatus::Completed; // user completed it by hand

        let mut edited = subject.clone();
        edited.name = "Linear Algebra".to_string();
        edited.end_date = date("2026-01-31");
        edited.completed_hours = 3.0;
        edited.topics.push(crate::models::Topic {
            id: "algebra-id-t3".to_string(),
            name: "Vectors".to_string(),
            completed: false,
        });

        assert!(sync_subject(&edited, &mut tasks));

        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.id, task_id, "edit must keep the task id");
        assert_eq!(task.subject_name, "Linear Algebra");
        assert_eq!(task.end_date, date("2026-01-31"));
        assert_eq!(task.completed_hours, 3.0);
        assert_eq!(task.target_hours, 6.0);
        assert_eq!(
            task.status,
            TaskStatus::Completed,
            "edit must not touch a manually set status"
        );
    }

    #[test]
    fn leaving_the_sync_condition_removes_the_task() {
        let subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false)])
            .in_progress()
            .auto_add()
            .build();
        let mut tasks = Vec::new();
        sync_subject(&subject, &mut tasks);
        assert_eq!(tasks.len(), 1);

        let mut edited = subject.clone();
        edited.auto_add_to_calendar = Some(false);

        assert!(sync_subject(&edited, &mut tasks));
        assert!(tasks.is_empty());

        // Removing again changes nothing.
        assert!(!sync_subject(&edited, &mut tasks));
    }

    #[test]
    fn edit_path_deletes_the_task_when_no_topics_are_pending() {
        let subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false)])
            .in_progress()
            .auto_add()
            .build();
        let mut tasks = Vec::new();
        sync_subject(&subject, &mut tasks);

        let mut edited = subject.clone();
        for topic in &mut edited.topics {
            topic.completed = true;
        }

        assert!(sync_subject(&edited, &mut tasks));
        assert!(tasks.is_empty(), "edit path removes the emptied task");
    }

    // The two empty-pending paths intentionally diverge: a full edit deletes
    // the task, finishing the last topic completes it in place.
    #[test]
    fn toggle_path_completes_the_task_instead_of_deleting_it() {
        let mut subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false)])
            .in_progress()
            .auto_add()
            .build();
        let mut tasks = Vec::new();
        sync_subject(&subject, &mut tasks);

        subject.topics[0].completed = true;

        assert!(sync_topic_toggle(&subject, &mut tasks));

        assert_eq!(tasks.len(), 1, "toggle path keeps the task");
        let task = &tasks[0];
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.topic_ids.is_empty());
        assert!(task.topic_names.is_empty());
        assert_eq!(task.target_hours, 0.0);

        // Re-running the toggle sync is a no-op.
        assert!(!sync_topic_toggle(&subject, &mut tasks));
    }

    #[test]
    fn toggle_path_refreshes_topics_and_target_only() {
        let mut subject = SubjectBuilder::new("Algebra")
            .topics(&[
                ("Linear equations", false),
                ("Matrices", false),
                ("Vectors", false),
            ])
            .in_progress()
            .auto_add()
            .build();
        let mut tasks = Vec::new();
        sync_subject(&subject, &mut tasks);
        let original_notes = tasks[0].notes.clone();
        let original_dates = (tasks[0].start_date, tasks[0].end_date);

        subject.topics[0].completed = true;

        assert!(sync_topic_toggle(&subject, &mut tasks));

        let task = &tasks[0];
        assert_eq!(task.topic_names, vec!["Matrices", "Vectors"]);
        assert_eq!(task.target_hours, 5.0);
        assert_eq!(task.notes, original_notes, "toggle path leaves notes alone");
        assert_eq!((task.start_date, task.end_date), original_dates);
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[test]
    fn toggle_sync_without_a_linked_task_is_a_no_op() {
        let subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false)])
            .in_progress()
            .auto_add()
            .build();
        let mut tasks = vec![TaskBuilder::new("Physics").subject_id("physics-id").build()];
        let snapshot = tasks.clone();

        assert!(!sync_topic_toggle(&subject, &mut tasks));
        assert_eq!(tasks, snapshot);
    }

    #[test]
    fn manual_tasks_are_invisible_to_the_synchronizer() {
        let subject = SubjectBuilder::new("Algebra")
            .topics(&[("Linear equations", false)])
            .in_progress()
            .auto_add()
            .build();
        let manual = TaskBuilder::new("Algebra")
            .id("hand-made")
            .subject_id("algebra-id")
            .manual()
            .build();
        let mut tasks = vec![manual.clone()];

        // The synchronizer creates its own task alongside the manual one.
        assert!(sync_subject(&subject, &mut tasks));
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0], manual, "manual task must not be edited");

        // And the toggle path only ever touches the auto task.
        let mut done = subject.clone();
        done.topics[0].completed = true;
        assert!(sync_topic_toggle(&done, &mut tasks));
        assert_eq!(tasks[0], manual);
        assert_eq!(tasks[1].status, TaskStatus::Completed);
    }

    #[test]
    fn deleting_a_subject_removes_its_tasks_and_no_others() {
        let mut tasks = vec![
            TaskBuilder::new("Algebra").id("auto").subject_id("algebra-id").build(),
            TaskBuilder::new("Algebra")
                .id("manual")
                .subject_id("algebra-id")
                .manual()
                .build(),
            TaskBuilder::new("Physics").id("other").subject_id("physics-id").build(),
        ];

        assert!(remove_subject_tasks("algebra-id", &mut tasks));

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "other");

        assert!(!remove_subject_tasks("algebra-id", &mut tasks));
    }

    #[test]
    fn frequency_labels_are_human_readable() {
        let everyday = SubjectBuilder::new("A")
            .frequency(Frequency::Everyday)
            .build();
        let weekdays = SubjectBuilder::new("B")
            .frequency(Frequency::Weekdays)
            .build();
        let custom = SubjectBuilder::new("C")
            .frequency(Frequency::Custom)
            .custom_days(&[1, 3, 5])
            .build();
        let unset = SubjectBuilder::new("D").build();

        assert_eq!(frequency_label(&everyday), "Everyday");
        assert_eq!(frequency_label(&weekdays), "Weekdays (Mon-Fri)");
        assert_eq!(frequency_label(&custom), "Custom: Mon, Wed, Fri");
        assert_eq!(frequency_label(&unset), "Everyday");
    }

    #[test]
    fn custom_frequency_ignores_out_of_range_days() {
        let subject = SubjectBuilder::new("C")
            .frequency(Frequency::Custom)
            .custom_days(&[0, 6, 9])
            .build();

        assert_eq!(frequency_label(&subject), "Custom: Sun, Sat");
    }
}
