#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::models::{TaskOrigin, TaskStatus};
    use crate::store::{
        Category, fetch_record, load_subjects, load_tasks, save_record, save_subjects,
        save_tasks,
    };
    use crate::test::utils::{SubjectBuilder, TaskBuilder, date, setup_test_pool};

    #[tokio::test]
    async fn collections_round_trip_through_the_store() {
        let pool = setup_test_pool().await;
        let subjects = vec![
            SubjectBuilder::new("Algebra")
                .topics(&[("Matrices", false), ("Vectors", true)])
                .in_progress()
                .auto_add()
                .build(),
            SubjectBuilder::new("Physics")
                .topics(&[("Optics", false)])
                .status(TaskStatus::Other("paused".to_string()))
                .build(),
        ];

        save_subjects(&pool, "user-1", &subjects).await.expect("save");
        let loaded = load_subjects(&pool, "user-1").await.expect("load");

        assert_eq!(loaded, subjects);
        assert_eq!(
            loaded[1].status,
            Some(TaskStatus::Other("paused".to_string())),
            "unknown statuses survive the round trip"
        );
    }

    #[tokio::test]
    async fn task_origin_and_daily_log_round_trip() {
        let pool = setup_test_pool().await;
        let mut task = TaskBuilder::new("Algebra")
            .subject_id("algebra-id")
            .manual()
            .build();
        crate::schedule::toggle_day(&mut task, date("2025-11-14"));

        save_tasks(&pool, "user-1", &[task.clone()]).await.expect("save");
        let loaded = load_tasks(&pool, "user-1").await.expect("load");

        assert_eq!(loaded, vec![task]);
        assert_eq!(loaded[0].origin, TaskOrigin::Manual);
    }

    #[tokio::test]
    async fn missing_records_load_as_empty_collections() {
        let pool = setup_test_pool().await;

        let loaded = load_subjects(&pool, "nobody").await.expect("load");

        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn saving_overwrites_the_whole_collection_in_one_record() {
        let pool = setup_test_pool().await;
        let two = vec![
            SubjectBuilder::new("Algebra").topics(&[("a", false)]).build(),
            SubjectBuilder::new("Physics").topics(&[("b", false)]).build(),
        ];
        save_subjects(&pool, "user-1", &two).await.expect("save");
        let first = fetch_record(&pool, "user-1", Category::Subjects)
            .await
            .expect("fetch")
            .expect("record exists");

        let one = vec![two[1].clone()];
        save_subjects(&pool, "user-1", &one).await.expect("save again");

        let loaded = load_subjects(&pool, "user-1").await.expect("load");
        assert_eq!(loaded, one);

        let second = fetch_record(&pool, "user-1", Category::Subjects)
            .await
            .expect("fetch")
            .expect("record exists");
        assert_eq!(second.id, first.id, "overwrite reuses the record");

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM progress_records WHERE student_id = ?")
                .bind("user-1")
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn payloads_are_wrapped_in_their_category_key() {
        let pool = setup_test_pool().await;
        let subjects = vec![SubjectBuilder::new("Algebra").topics(&[("a", false)]).build()];

        save_subjects(&pool, "user-1", &subjects).await.expect("save");

        let record = fetch_record(&pool, "user-1", Category::Subjects)
            .await
            .expect("fetch")
            .expect("record exists");
        let value: serde_json::Value = serde_json::from_str(&record.payload).expect("json");
        assert!(value.get("subjects").is_some_and(serde_json::Value::is_array));
    }

    #[tokio::test]
    async fn malformed_payloads_load_as_empty_rather_than_failing() {
        let pool = setup_test_pool().await;

        save_record(&pool, "user-1", Category::Subjects, "not json at all")
            .await
            .expect("save raw");

        let loaded = load_subjects(&pool, "user-1").await.expect("load");
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn categories_are_independent() {
        let pool = setup_test_pool().await;
        let subjects = vec![SubjectBuilder::new("Algebra").topics(&[("a", false)]).build()];
        let tasks = vec![TaskBuilder::new("Algebra").subject_id("algebra-id").build()];

        save_subjects(&pool, "user-1", &subjects).await.expect("save subjects");
        save_tasks(&pool, "user-1", &tasks).await.expect("save tasks");

        save_subjects(&pool, "user-1", &[]).await.expect("clear subjects");

        assert!(load_subjects(&pool, "user-1").await.expect("load").is_empty());
        assert_eq!(load_tasks(&pool, "user-1").await.expect("load"), tasks);
    }

    #[tokio::test]
    async fn users_do_not_see_each_others_data() {
        let pool = setup_test_pool().await;
        let subjects = vec![SubjectBuilder::new("Algebra").topics(&[("a", false)]).build()];

        save_subjects(&pool, "user-1", &subjects).await.expect("save");

        assert!(load_subjects(&pool, "user-2").await.expect("load").is_empty());
    }
}
