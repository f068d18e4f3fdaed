use journal_core::db::open_db_in_memory;
use journal_core::{
    CreateEntryRequest, EntryFilter, EntryKind, EntryListQuery, EntryTransitionError, Habit,
    JournalEntry, JournalRepository, JournalService, JournalServiceError, RepoError,
    SqliteAccountRepository, SqliteJournalRepository, User, UserRepository, WriteOutcome,
};
use rusqlite::Connection;
use uuid::Uuid;

fn seeded_conn() -> (Connection, User) {
    let conn = open_db_in_memory().unwrap();
    let user = insert_user(&conn, "ada@example.com", false);
    (conn, user)
}

fn insert_user(conn: &Connection, email: &str, is_staff: bool) -> User {
    let mut user = User::new(email, "hash");
    user.is_staff = is_staff;
    SqliteAccountRepository::try_new(conn)
        .unwrap()
        .create_user(&user)
        .unwrap();
    user
}

fn request(kind: EntryKind, text: &str, scheduled_for: Option<i64>) -> CreateEntryRequest {
    CreateEntryRequest {
        text: text.to_string(),
        kind,
        scheduled_for,
    }
}

fn habit_rows_for(conn: &Connection, entry_id: Uuid) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM habits WHERE source_entry_id = ?1;",
        [entry_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn todo_without_schedule_is_rejected_and_nothing_is_stored() {
    let (mut conn, user) = seeded_conn();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let err = service
        .create_entry(
            &user.as_requester(),
            request(EntryKind::Todo, "Pay rent", None),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        JournalServiceError::Validation {
            field: "scheduled_for",
            ..
        }
    ));
    assert_eq!(err.to_string(), "scheduled_for: Scheduled time is required for todo type");

    let entries = service
        .list_entries(&user.as_requester(), &EntryFilter::default())
        .unwrap();
    assert!(entries.is_empty());
}

#[test]
fn todo_with_past_schedule_is_accepted() {
    let (mut conn, user) = seeded_conn();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let entry = service
        .create_entry(
            &user.as_requester(),
            request(EntryKind::Todo, "Pay rent", Some(1_735_689_600_000)),
        )
        .unwrap();
    assert_eq!(entry.kind, EntryKind::Todo);
    assert_eq!(entry.scheduled_for, Some(1_735_689_600_000));
}

#[test]
fn habit_entry_gets_exactly_one_companion_habit() {
    let (mut conn, user) = seeded_conn();
    let entry_id = {
        let mut service =
            JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());
        let entry = service
            .create_entry(
                &user.as_requester(),
                request(EntryKind::Habit, "Drink water", None),
            )
            .unwrap();
        assert_eq!(entry.kind, EntryKind::Habit);

        let habits = service.list_habits(&user.as_requester()).unwrap();
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].text, "Drink water");
        assert_eq!(habits[0].source_entry, Some(entry.id));
        assert_eq!(habits[0].owner, user.id);
        entry.id
    };

    assert_eq!(habit_rows_for(&conn, entry_id), 1);
}

#[test]
fn completing_twice_conflicts_and_keeps_first_timestamp() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let entry = service
        .create_entry(&requester, request(EntryKind::Log, "Walked", None))
        .unwrap();
    let first = service.complete_entry(&requester, entry.id).unwrap();
    let first_completed_at = first.completed_at.expect("completed_at should be set");

    let err = service.complete_entry(&requester, entry.id).unwrap_err();
    assert!(matches!(
        err,
        JournalServiceError::Conflict(EntryTransitionError::AlreadyCompleted)
    ));
    assert_eq!(err.to_string(), "Log is already marked as done.");

    let reloaded = service.get_entry(&requester, entry.id).unwrap();
    assert_eq!(reloaded.completed_at, Some(first_completed_at));
}

#[test]
fn habitizing_twice_conflicts_and_keeps_one_habit() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let entry_id = {
        let mut service =
            JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());
        let entry = service
            .create_entry(&requester, request(EntryKind::Todo, "Stretch", Some(0)))
            .unwrap();

        let habits = service.habitize_entry(&requester, entry.id).unwrap();
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].text, "Stretch");

        let err = service.habitize_entry(&requester, entry.id).unwrap_err();
        assert!(matches!(
            err,
            JournalServiceError::Conflict(EntryTransitionError::AlreadyHabit)
        ));
        assert_eq!(err.to_string(), "This log is already a habit");

        let reloaded = service.get_entry(&requester, entry.id).unwrap();
        assert_eq!(reloaded.kind, EntryKind::Habit);
        entry.id
    };

    assert_eq!(habit_rows_for(&conn, entry_id), 1);
}

#[test]
fn habit_created_entry_cannot_be_habitized() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let entry = service
        .create_entry(&requester, request(EntryKind::Habit, "Meditate", None))
        .unwrap();
    assert!(matches!(
        service.habitize_entry(&requester, entry.id),
        Err(JournalServiceError::Conflict(
            EntryTransitionError::AlreadyHabit
        ))
    ));
    assert_eq!(service.list_habits(&requester).unwrap().len(), 1);
}

#[test]
fn complete_then_habitize_keeps_completion() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let entry = service
        .create_entry(&requester, request(EntryKind::Log, "Ran 5k", None))
        .unwrap();
    let completed = service.complete_entry(&requester, entry.id).unwrap();
    assert!(service.complete_entry(&requester, entry.id).is_err());

    let habits = service.habitize_entry(&requester, entry.id).unwrap();
    assert_eq!(
        habits.iter().map(|habit| habit.text.as_str()).collect::<Vec<_>>(),
        vec!["Ran 5k"]
    );

    let reloaded = service.get_entry(&requester, entry.id).unwrap();
    assert_eq!(reloaded.kind, EntryKind::Habit);
    assert_eq!(reloaded.completed_at, completed.completed_at);
}

#[test]
fn soft_deleted_entries_never_list() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let kept = service
        .create_entry(&requester, request(EntryKind::Todo, "keep", Some(0)))
        .unwrap();
    let dropped = service
        .create_entry(&requester, request(EntryKind::Todo, "drop", Some(0)))
        .unwrap();
    service.delete_entry(&requester, dropped.id).unwrap();

    let today = chrono::Utc::now().date_naive();
    let filters = [
        EntryFilter::default(),
        EntryFilter {
            kind: Some(EntryKind::Todo),
            ..EntryFilter::default()
        },
        EntryFilter {
            date: Some(today),
            ..EntryFilter::default()
        },
        EntryFilter {
            date: Some(today),
            kind: Some(EntryKind::Todo),
            limit: Some(200),
            offset: 0,
        },
    ];
    for filter in &filters {
        let ids = service
            .list_entries(&requester, filter)
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![kept.id], "filter {filter:?}");
    }

    assert!(matches!(
        service.get_entry(&requester, dropped.id),
        Err(JournalServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.complete_entry(&requester, dropped.id),
        Err(JournalServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_entry(&requester, dropped.id),
        Err(JournalServiceError::NotFound(_))
    ));
}

#[test]
fn deleting_habit_entry_keeps_companion_habit() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let entry = service
        .create_entry(&requester, request(EntryKind::Habit, "Floss", None))
        .unwrap();
    service.delete_entry(&requester, entry.id).unwrap();

    let habits = service.list_habits(&requester).unwrap();
    assert_eq!(habits.len(), 1);
    service.delete_habit(&requester, habits[0].id).unwrap();
    assert!(service.list_habits(&requester).unwrap().is_empty());
}

#[test]
fn list_filters_by_kind_and_paginates_newest_first() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let mut created = Vec::new();
    for index in 0..3 {
        created.push(
            service
                .create_entry(&requester, request(EntryKind::Log, &format!("log {index}"), None))
                .unwrap(),
        );
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    service
        .create_entry(&requester, request(EntryKind::Todo, "todo", Some(0)))
        .unwrap();

    let logs = service
        .list_entries(
            &requester,
            &EntryFilter {
                kind: Some(EntryKind::Log),
                ..EntryFilter::default()
            },
        )
        .unwrap();
    assert_eq!(
        logs.iter().map(|entry| entry.id).collect::<Vec<_>>(),
        created.iter().rev().map(|entry| entry.id).collect::<Vec<_>>()
    );

    let page = service
        .list_entries(
            &requester,
            &EntryFilter {
                kind: Some(EntryKind::Log),
                limit: Some(1),
                offset: 1,
                ..EntryFilter::default()
            },
        )
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, created[1].id);

    let yesterday = chrono::Utc::now().date_naive().pred_opt().unwrap();
    let none = service
        .list_entries(
            &requester,
            &EntryFilter {
                date: Some(yesterday),
                ..EntryFilter::default()
            },
        )
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn unpaged_listing_returns_every_live_entry() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    for index in 0..251 {
        service
            .create_entry(&requester, request(EntryKind::Log, &format!("log {index}"), None))
            .unwrap();
    }

    let all = service
        .list_entries(&requester, &EntryFilter::default())
        .unwrap();
    assert_eq!(all.len(), 251);

    let capped = service
        .list_entries(
            &requester,
            &EntryFilter {
                limit: Some(1_000),
                ..EntryFilter::default()
            },
        )
        .unwrap();
    assert_eq!(capped.len(), 200);

    let tail = service
        .list_entries(
            &requester,
            &EntryFilter {
                offset: 250,
                ..EntryFilter::default()
            },
        )
        .unwrap();
    assert_eq!(tail.len(), 1);
}

#[test]
fn other_users_entries_are_not_found_but_staff_can_reach_them() {
    let (mut conn, owner) = seeded_conn();
    let stranger = insert_user(&conn, "eve@example.com", false);
    let admin = insert_user(&conn, "root@example.com", true);
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());

    let entry = service
        .create_entry(
            &owner.as_requester(),
            request(EntryKind::Log, "private", None),
        )
        .unwrap();

    let stranger = stranger.as_requester();
    assert!(matches!(
        service.get_entry(&stranger, entry.id),
        Err(JournalServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.complete_entry(&stranger, entry.id),
        Err(JournalServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.habitize_entry(&stranger, entry.id),
        Err(JournalServiceError::NotFound(_))
    ));
    assert!(service
        .list_entries(&stranger, &EntryFilter::default())
        .unwrap()
        .is_empty());

    let admin = admin.as_requester();
    let completed = service.complete_entry(&admin, entry.id).unwrap();
    assert!(completed.completed_at.is_some());

    // Companion habit belongs to the entry owner, not the admin.
    assert!(service.habitize_entry(&admin, entry.id).unwrap().is_empty());
    assert_eq!(service.list_habits(&owner.as_requester()).unwrap().len(), 1);
}

#[test]
fn unknown_ids_are_not_found() {
    let (mut conn, user) = seeded_conn();
    let requester = user.as_requester();
    let mut service = JournalService::new(SqliteJournalRepository::try_new(&mut conn).unwrap());
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.complete_entry(&requester, missing),
        Err(JournalServiceError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.habitize_entry(&requester, missing),
        Err(JournalServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_habit(&requester, missing),
        Err(JournalServiceError::NotFound(_))
    ));
}

#[test]
fn repo_conditional_updates_report_unchanged() {
    let (mut conn, user) = seeded_conn();
    let mut repo = SqliteJournalRepository::try_new(&mut conn).unwrap();

    let entry = JournalEntry::new(user.id, EntryKind::Log, "plain");
    repo.create_entry(&entry, None).unwrap();
    let at = entry.created_at + 10;

    assert_eq!(repo.complete_entry(entry.id, at).unwrap(), WriteOutcome::Applied);
    assert_eq!(
        repo.complete_entry(entry.id, at + 5).unwrap(),
        WriteOutcome::Unchanged
    );
    assert_eq!(
        repo.get_entry(entry.id, false).unwrap().unwrap().completed_at,
        Some(at)
    );

    let habit = Habit::from_entry(&entry);
    assert_eq!(
        repo.habitize_entry(entry.id, &habit).unwrap(),
        WriteOutcome::Applied
    );
    let again = Habit::from_entry(&entry);
    assert_eq!(
        repo.habitize_entry(entry.id, &again).unwrap(),
        WriteOutcome::Unchanged
    );

    assert_eq!(
        repo.soft_delete_entry(entry.id, at).unwrap(),
        WriteOutcome::Applied
    );
    assert_eq!(
        repo.soft_delete_entry(entry.id, at).unwrap(),
        WriteOutcome::Unchanged
    );
    assert!(repo.get_entry(entry.id, false).unwrap().is_none());
    assert!(repo.get_entry(entry.id, true).unwrap().is_some());

    let mut query = EntryListQuery::for_owner(user.id);
    assert!(repo.list_entries(&query).unwrap().is_empty());
    query.include_deleted = true;
    assert_eq!(repo.list_entries(&query).unwrap().len(), 1);
}

#[test]
fn habitize_rolls_back_when_companion_insert_collides() {
    let (mut conn, user) = seeded_conn();
    let entry = JournalEntry::new(user.id, EntryKind::Log, "collide");
    {
        let mut repo = SqliteJournalRepository::try_new(&mut conn).unwrap();
        repo.create_entry(&entry, None).unwrap();
    }

    // A habit already points at the entry although the entry is still a log.
    conn.execute(
        "INSERT INTO habits (id, owner_id, source_entry_id, text, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'collide', ?4, ?4);",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            user.id.to_string(),
            entry.id.to_string(),
            entry.created_at
        ],
    )
    .unwrap();

    {
        let mut repo = SqliteJournalRepository::try_new(&mut conn).unwrap();
        let err = repo
            .habitize_entry(entry.id, &Habit::from_entry(&entry))
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate("habits.source_entry_id")));

        let reloaded = repo.get_entry(entry.id, false).unwrap().unwrap();
        assert_eq!(reloaded.kind, EntryKind::Log);
    }

    assert_eq!(habit_rows_for(&conn, entry.id), 1);
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteJournalRepository::try_new(&mut conn),
        Err(RepoError::UninitializedConnection { .. })
    ));
}
