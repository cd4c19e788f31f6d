use comicdesk_core::db::open_db_in_memory;
use comicdesk_core::{
    CatalogQueryProvider, CatalogRepository, CatalogService, ChangeEvent, ComicDraft, EntityRef,
    FormPhase, FormSchema, FormSession, FormSynchronizer, RepoError, SqliteCatalogRepository,
    SubmitError, SubmitPolicy,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

struct Seeded {
    author: i64,
    other_author: i64,
    kind: i64,
    action: i64,
    drama: i64,
}

fn seed(service: &CatalogService<SqliteCatalogRepository<'_>>) -> Seeded {
    let author = service.create_author("Katsuhiro Otomo", Some("male")).unwrap();
    let other_author = service.create_author("Rumiko Takahashi", None).unwrap();
    let kind = service.create_type("Manga").unwrap();
    let action = service.create_category("Action").unwrap();
    let drama = service.create_category("Drama").unwrap();
    Seeded {
        author: author.id,
        other_author: other_author.id,
        kind: kind.id,
        action: action.id,
        drama: drama.id,
    }
}

fn service(conn: &Connection) -> CatalogService<SqliteCatalogRepository<'_>> {
    CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap())
}

#[test]
fn create_comic_roundtrip_links_categories() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);

    let created = service
        .create_comic(&ComicDraft {
            name: "  Akira ".to_string(),
            author_id: ids.author,
            type_id: ids.kind,
            category_ids: vec![ids.drama, ids.action, ids.drama],
        })
        .unwrap();

    assert_eq!(created.name, "Akira");
    assert_eq!(created.author, EntityRef { id: ids.author });
    assert_eq!(created.kind, EntityRef { id: ids.kind });
    assert_eq!(
        created.categories,
        vec![EntityRef { id: ids.action }, EntityRef { id: ids.drama }]
    );
    assert_eq!(service.get_comic(created.id).unwrap(), Some(created));
}

#[test]
fn create_comic_rejects_unknown_references_atomically() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);

    let err = service
        .create_comic(&ComicDraft {
            name: "Ghost".to_string(),
            author_id: 999,
            type_id: ids.kind,
            category_ids: Vec::new(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: "author",
            id: 999
        }
    ));

    let err = service
        .create_comic(&ComicDraft {
            name: "Ghost".to_string(),
            author_id: ids.author,
            type_id: ids.kind,
            category_ids: vec![ids.action, 404],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: "category",
            id: 404
        }
    ));

    assert!(service.list_comics().unwrap().is_empty());
}

#[test]
fn blank_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    assert!(matches!(
        service.create_author("  ", None).unwrap_err(),
        RepoError::Validation(_)
    ));
    assert!(matches!(
        service.create_category("").unwrap_err(),
        RepoError::Validation(_)
    ));
    assert!(matches!(
        service.create_type("\t").unwrap_err(),
        RepoError::Validation(_)
    ));
}

#[test]
fn author_gender_is_optional_and_trimmed() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let with_gender = service.create_author("A", Some(" female ")).unwrap();
    let blank_gender = service.create_author("B", Some("  ")).unwrap();

    assert_eq!(with_gender.gender.as_deref(), Some("female"));
    assert_eq!(blank_gender.gender, None);
    assert_eq!(service.list_authors().unwrap(), vec![with_gender, blank_gender]);
}

#[test]
fn list_comics_shows_author_names_in_id_order() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);

    for (name, author) in [("Akira", ids.author), ("Ranma", ids.other_author)] {
        service
            .create_comic(&ComicDraft {
                name: name.to_string(),
                author_id: author,
                type_id: ids.kind,
                category_ids: Vec::new(),
            })
            .unwrap();
    }

    let rows = service.list_comics().unwrap();
    let summary = rows
        .iter()
        .map(|row| (row.name.as_str(), row.author_name.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![("Akira", "Katsuhiro Otomo"), ("Ranma", "Rumiko Takahashi")]
    );
}

#[test]
fn delete_category_unlinks_comics_and_reports_missing() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);
    let comic = service
        .create_comic(&ComicDraft {
            name: "Akira".to_string(),
            author_id: ids.author,
            type_id: ids.kind,
            category_ids: vec![ids.action, ids.drama],
        })
        .unwrap();

    service.delete_category(ids.action).unwrap();

    let reloaded = service.get_comic(comic.id).unwrap().unwrap();
    assert_eq!(reloaded.categories, vec![EntityRef { id: ids.drama }]);
    assert_eq!(service.list_categories().unwrap().len(), 1);

    let err = service.delete_category(ids.action).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "category", .. }));
}

#[test]
fn reference_lists_follow_storage_order() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let empty = service.reference_lists().unwrap();
    assert!(empty.authors.is_empty() && empty.categories.is_empty() && empty.types.is_empty());

    let ids = seed(&service);
    let lists = service.reference_lists().unwrap();
    assert_eq!(
        lists.authors.iter().map(|option| option.id).collect::<Vec<_>>(),
        vec![ids.author, ids.other_author]
    );
    assert_eq!(lists.authors[0].label, "Katsuhiro Otomo");
    assert_eq!(
        lists.categories.iter().map(|option| option.id).collect::<Vec<_>>(),
        vec![ids.action, ids.drama]
    );
    assert_eq!(lists.types[0].id, ids.kind);
}

#[tokio::test]
async fn comic_form_submits_through_storage_executor() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);

    let mut session =
        FormSession::mount(FormSynchronizer::new(FormSchema::comic()), &service).unwrap();
    assert_eq!(session.state().id("author"), Some(ids.author));
    assert_eq!(session.state().id("type"), Some(ids.kind));

    session.apply(&ChangeEvent::text("name", "Akira")).unwrap();
    session
        .apply(&ChangeEvent::select("author", ids.other_author.to_string()))
        .unwrap();
    session
        .apply(&ChangeEvent::toggle("categories", ids.drama.to_string(), true))
        .unwrap();

    let created = session.submit(&service.comic_executor()).await.unwrap();

    assert_eq!(created.name, "Akira");
    assert_eq!(created.author, EntityRef { id: ids.other_author });
    assert_eq!(created.categories, vec![EntityRef { id: ids.drama }]);
    assert_eq!(service.list_comics().unwrap().len(), 1);
}

#[tokio::test]
async fn permissive_comic_submit_surfaces_executor_codes() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let sync =
        FormSynchronizer::new(FormSchema::comic()).with_submit_policy(SubmitPolicy::Permissive);
    let mut session = FormSession::mount(sync, &service).unwrap();
    session.apply(&ChangeEvent::text("name", "Orphan")).unwrap();

    let err = session.submit(&service.comic_executor()).await.unwrap_err();
    match err {
        SubmitError::Mutation(mutation) => assert_eq!(mutation.code, "invalid_payload"),
        other => panic!("unexpected error: {other}"),
    }

    session.apply(&ChangeEvent::select("author", "12")).unwrap();
    session.apply(&ChangeEvent::select("type", "13")).unwrap();
    let err = session.submit(&service.comic_executor()).await.unwrap_err();
    match err {
        SubmitError::Mutation(mutation) => {
            assert_eq!(mutation.code, "not_found");
            assert!(mutation.message.contains("author not found: 12"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn inline_author_creation_refreshes_comic_form() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.create_type("Manga").unwrap();

    let mut comic_form =
        FormSession::mount(FormSynchronizer::new(FormSchema::comic()), &service).unwrap();
    assert_eq!(comic_form.state().id("author"), None);

    let mut author_form =
        FormSession::mount(FormSynchronizer::new(FormSchema::author()), &service).unwrap();
    author_form
        .apply(&ChangeEvent::text("name", "Naoki Urasawa"))
        .unwrap();
    let author = author_form
        .submit(&service.author_executor())
        .await
        .unwrap();
    assert_eq!(author.gender, None);
    author_form.close();

    comic_form.refresh(&service).unwrap();
    assert_eq!(comic_form.state().id("author"), Some(author.id));
}

#[tokio::test]
async fn category_form_rejects_blank_name_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut form =
        FormSession::mount(FormSynchronizer::new(FormSchema::category()), &service).unwrap();
    assert!(matches!(
        form.submit(&service.category_executor()).await.unwrap_err(),
        SubmitError::Validation(_)
    ));

    form.apply(&ChangeEvent::text("name", "Horror")).unwrap();
    let category = form.submit(&service.category_executor()).await.unwrap();
    assert_eq!(category.name, "Horror");
    assert_eq!(
        SqliteCatalogRepository::try_new(&conn)
            .unwrap()
            .get_category(category.id)
            .unwrap(),
        Some(category)
    );
}

fn akira(service: &CatalogService<SqliteCatalogRepository<'_>>, ids: &Seeded) -> i64 {
    service
        .create_comic(&ComicDraft {
            name: "Akira".to_string(),
            author_id: ids.author,
            type_id: ids.kind,
            category_ids: vec![ids.action],
        })
        .unwrap()
        .id
}

#[test]
fn update_comic_keeps_id_and_replaces_categories() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);
    let comic_id = akira(&service, &ids);

    let updated = service
        .update_comic(
            comic_id,
            &ComicDraft {
                name: " Akira (Deluxe) ".to_string(),
                author_id: ids.other_author,
                type_id: ids.kind,
                category_ids: vec![ids.drama],
            },
        )
        .unwrap();

    assert_eq!(updated.id, comic_id);
    assert_eq!(updated.name, "Akira (Deluxe)");
    assert_eq!(updated.author, EntityRef { id: ids.other_author });
    assert_eq!(updated.categories, vec![EntityRef { id: ids.drama }]);
    assert_eq!(service.list_comics().unwrap().len(), 1);

    let link_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM comic_categories WHERE comic_id = ?1;",
            [comic_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(link_rows, 1);
}

#[test]
fn update_comic_rejects_missing_comic_and_leaves_links_on_bad_reference() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);
    let comic_id = akira(&service, &ids);

    let draft = ComicDraft {
        name: "Ghost".to_string(),
        author_id: ids.author,
        type_id: ids.kind,
        category_ids: Vec::new(),
    };
    assert!(matches!(
        service.update_comic(404, &draft).unwrap_err(),
        RepoError::NotFound { entity: "comic", id: 404 }
    ));

    let bad_category = ComicDraft {
        category_ids: vec![ids.drama, 77],
        ..draft
    };
    assert!(matches!(
        service.update_comic(comic_id, &bad_category).unwrap_err(),
        RepoError::NotFound { entity: "category", id: 77 }
    ));

    let unchanged = service.get_comic(comic_id).unwrap().unwrap();
    assert_eq!(unchanged.name, "Akira");
    assert_eq!(unchanged.categories, vec![EntityRef { id: ids.action }]);
}

#[test]
fn author_and_category_updates_are_read_back() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);

    let author = service
        .update_author(ids.other_author, "Rumiko T.", Some(" female "))
        .unwrap();
    assert_eq!(author.name, "Rumiko T.");
    assert_eq!(author.gender.as_deref(), Some("female"));

    let category = service.update_category(ids.drama, "Slice of life").unwrap();
    assert_eq!(service.get_category(ids.drama).unwrap(), Some(category));

    assert!(matches!(
        service.update_category(999, "X").unwrap_err(),
        RepoError::NotFound { entity: "category", .. }
    ));
    assert_eq!(service.get_category(999).unwrap(), None);
}

#[tokio::test]
async fn comic_edit_form_starts_from_record_and_updates_in_place() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);
    let comic_id = akira(&service, &ids);
    let record = service.get_comic(comic_id).unwrap().unwrap();

    let mut form =
        FormSession::mount_edit(FormSynchronizer::new(FormSchema::comic()), &service, &record)
            .unwrap();
    assert!(form.is_edit());
    assert_eq!(form.state().text("name"), Some("Akira"));
    assert_eq!(form.state().ids("categories"), Some(&BTreeSet::from([ids.action])));

    form.apply(&ChangeEvent::toggle("categories", ids.action.to_string(), false))
        .unwrap();
    form.apply(&ChangeEvent::toggle("categories", ids.drama.to_string(), true))
        .unwrap();
    form.apply(&ChangeEvent::text("name", "Akira 2")).unwrap();

    let updated = form
        .submit(&service.comic_update_executor(comic_id))
        .await
        .unwrap();

    assert_eq!(form.phase(), FormPhase::SubmittedSuccess);
    assert_eq!(updated.id, comic_id);
    assert_eq!(updated.name, "Akira 2");
    assert_eq!(updated.categories, vec![EntityRef { id: ids.drama }]);
    assert_eq!(service.list_comics().unwrap().len(), 1);
}

#[test]
fn edit_form_reset_returns_to_record_values() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ids = seed(&service);
    let comic_id = akira(&service, &ids);
    let record = service.get_comic(comic_id).unwrap().unwrap();

    let mut form =
        FormSession::mount_edit(FormSynchronizer::new(FormSchema::comic()), &service, &record)
            .unwrap();
    let opened = form.state().clone();
    form.apply(&ChangeEvent::select("author", ids.other_author.to_string()))
        .unwrap();

    form.refresh(&service).unwrap();

    assert_eq!(form.state(), &opened);
    assert_eq!(form.state().id("author"), Some(ids.author));
    assert_eq!(form.phase(), FormPhase::Mounted);
}
