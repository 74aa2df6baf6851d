//! End-to-end import flow tests
//!
//! Full sheets → orchestrator → content graph runs against an in-memory
//! database, covering idempotent re-import, cross-sheet reference
//! resolution, order diffing and per-row failure isolation.

mod helpers;

use helpers::{run_job, test_pool, write_sheet};

use courseport_ingest::db::{content, jobs, quiz, terms};
use courseport_ingest::models::{JobState, LogSeverity, SheetSet};
use courseport_ingest::services::Orchestrator;
use tempfile::TempDir;

const COURSES: &str = "\
id,course,description,modules,categories,teacher username,teacher email
c1,Baking Basics,Learn to bake,\"Week 1,Week 2\",Cooking,alice,alice@example.com
";

const QUESTIONS: &str = "\
id,question,type,answer,grade
q1,What rises dough?,multiple-choice,\"right: Yeast, wrong: Salt, wrong: Sugar\",2
q2,Bread needs an oven,boolean,true,1
q3,Describe kneading,multi-line,Free text answer,1
";

const LESSONS: &str = "\
id,lesson,course,module,questions,pass required,passmark,description
l1,Kneading,c1,Week 1,\"q1,q2,q3\",1,80,How to knead
";

fn full_sheet_set(dir: &TempDir) -> SheetSet {
    SheetSet {
        courses: Some(write_sheet(dir, "courses.csv", COURSES)),
        questions: Some(write_sheet(dir, "questions.csv", QUESTIONS)),
        lessons: Some(write_sheet(dir, "lessons.csv", LESSONS)),
    }
}

#[tokio::test]
async fn full_import_builds_the_content_graph() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let job = run_job(&pool, full_sheet_set(&dir), 50).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.counts.created, 5, "course + 3 questions + lesson");
    assert_eq!(job.counts.failed, 0);

    let course_id = content::find_id_by_slug(&pool, "course", "baking-basics")
        .await
        .unwrap()
        .expect("course created");
    let lesson_id = content::find_id_by_slug(&pool, "lesson", "kneading")
        .await
        .unwrap()
        .expect("lesson created");

    // Lesson belongs to the course and to a module of that course
    assert_eq!(
        content::get_meta(&pool, lesson_id, "_lesson_course")
            .await
            .unwrap()
            .as_deref(),
        Some(course_id.to_string().as_str())
    );
    let module = terms::find_by_slug(&pool, "module", "week-1")
        .await
        .unwrap()
        .expect("module term");
    assert!(terms::item_has_term(&pool, course_id, module.id).await.unwrap());
    assert!(terms::item_has_term(&pool, lesson_id, module.id).await.unwrap());
    assert!(terms::order_revision(&pool, course_id, "module")
        .await
        .unwrap()
        .is_some());

    // Exactly one quiz, carrying the pass settings
    let quiz_id = quiz::find_for_lesson(&pool, lesson_id)
        .await
        .unwrap()
        .expect("quiz created");
    assert_eq!(
        content::get_meta(&pool, quiz_id, "_pass_required").await.unwrap().as_deref(),
        Some("1")
    );
    assert_eq!(
        content::get_meta(&pool, quiz_id, "_quiz_passmark").await.unwrap().as_deref(),
        Some("80")
    );

    // Question order follows the lesson's list
    let q1 = content::find_id_by_slug(&pool, "question", "what-rises-dough")
        .await
        .unwrap()
        .unwrap();
    let q2 = content::find_id_by_slug(&pool, "question", "bread-needs-an-oven")
        .await
        .unwrap()
        .unwrap();
    let q3 = content::find_id_by_slug(&pool, "question", "describe-kneading")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quiz::question_order(&pool, quiz_id).await.unwrap(), vec![q1, q2, q3]);

    // Multiple-choice answers were parsed into the storage shape
    assert_eq!(
        content::get_meta(&pool, q1, "_right_answer_count").await.unwrap().as_deref(),
        Some("1")
    );
    assert_eq!(
        content::get_meta(&pool, q1, "_wrong_answer_count").await.unwrap().as_deref(),
        Some("2")
    );
    assert_eq!(
        content::get_meta(&pool, q1, "_question_right_answers").await.unwrap().as_deref(),
        Some("[\"Yeast\"]")
    );
    assert_eq!(
        content::get_meta(&pool, q2, "_question_answer").await.unwrap().as_deref(),
        Some("1")
    );
}

#[tokio::test]
async fn reimporting_the_same_sheets_is_idempotent() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let first = run_job(&pool, full_sheet_set(&dir), 50).await;
    assert_eq!(first.counts.created, 5);

    let course_id = content::find_id_by_slug(&pool, "course", "baking-basics")
        .await
        .unwrap()
        .unwrap();
    let lesson_id = content::find_id_by_slug(&pool, "lesson", "kneading")
        .await
        .unwrap()
        .unwrap();
    let quiz_id = quiz::find_for_lesson(&pool, lesson_id).await.unwrap().unwrap();

    let course_rev = content::revision(&pool, course_id).await.unwrap();
    let lesson_rev = content::revision(&pool, lesson_id).await.unwrap();
    let order_rev = quiz::order_revision(&pool, quiz_id).await.unwrap().unwrap();
    let module_rev = terms::order_revision(&pool, course_id, "module")
        .await
        .unwrap()
        .unwrap();

    // Second job over identical input: everything resolves to the same
    // ids, nothing is rewritten
    let second = run_job(&pool, full_sheet_set(&dir), 50).await;
    assert_eq!(second.state, JobState::Completed);
    assert_eq!(second.counts.created, 0);
    assert_eq!(second.counts.updated, 5);
    assert_eq!(second.counts.failed, 0);

    assert_eq!(
        content::find_id_by_slug(&pool, "course", "baking-basics").await.unwrap(),
        Some(course_id)
    );
    assert_eq!(
        content::find_id_by_slug(&pool, "lesson", "kneading").await.unwrap(),
        Some(lesson_id)
    );
    assert_eq!(content::revision(&pool, course_id).await.unwrap(), course_rev);
    assert_eq!(content::revision(&pool, lesson_id).await.unwrap(), lesson_rev);
    assert_eq!(
        quiz::order_revision(&pool, quiz_id).await.unwrap().unwrap(),
        order_rev
    );
    assert_eq!(
        terms::order_revision(&pool, course_id, "module").await.unwrap().unwrap(),
        module_rev
    );
}

#[tokio::test]
async fn lesson_referencing_unknown_course_is_a_hard_error() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        lessons: Some(write_sheet(
            &dir,
            "lessons.csv",
            "id,lesson,course\nl1,Orphan Lesson,c9\n",
        )),
        ..Default::default()
    };

    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.counts.failed, 1);
    assert_eq!(job.counts.created, 0);

    // The lesson was not created
    assert_eq!(
        content::find_id_by_slug(&pool, "lesson", "orphan-lesson").await.unwrap(),
        None
    );

    let log = jobs::load_log(&pool, job.job_id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].severity, LogSeverity::Error);
    assert_eq!(log[0].code, "reference");
    assert_eq!(log[0].line, 2);
}

#[tokio::test]
async fn module_foreign_to_the_lessons_course_is_rejected() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        courses: Some(write_sheet(
            &dir,
            "courses.csv",
            "id,course,modules\nc1,Course One,Alpha\nc2,Course Two,Beta\n",
        )),
        lessons: Some(write_sheet(
            &dir,
            "lessons.csv",
            "id,lesson,course,module\nl1,Stray Lesson,c1,Beta\n",
        )),
        ..Default::default()
    };

    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.counts.created, 2, "both courses land");
    assert_eq!(job.counts.failed, 1, "the lesson is rejected");

    // No partial write: the lesson does not exist at all
    assert_eq!(
        content::find_id_by_slug(&pool, "lesson", "stray-lesson").await.unwrap(),
        None
    );

    let log = jobs::load_log(&pool, job.job_id).await.unwrap();
    let error = log
        .iter()
        .find(|entry| entry.severity == LogSeverity::Error)
        .expect("reference error logged");
    assert_eq!(error.code, "reference");
    assert!(error.message.contains("Beta"), "message: {}", error.message);
}

#[tokio::test]
async fn unchanged_question_order_is_not_rewritten() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let questions = "id,question,type,answer\nq1,Q one?,multi-line,a\nq2,Q two?,multi-line,b\n";
    let lessons_ab = "id,lesson,questions\nl1,Quiz Lesson,\"q1,q2\"\n";
    let lessons_ba = "id,lesson,questions\nl1,Quiz Lesson,\"q2,q1\"\n";

    let sheets = SheetSet {
        questions: Some(write_sheet(&dir, "questions.csv", questions)),
        lessons: Some(write_sheet(&dir, "lessons.csv", lessons_ab)),
        ..Default::default()
    };
    run_job(&pool, sheets.clone(), 50).await;

    let lesson_id = content::find_id_by_slug(&pool, "lesson", "quiz-lesson")
        .await
        .unwrap()
        .unwrap();
    let quiz_id = quiz::find_for_lesson(&pool, lesson_id).await.unwrap().unwrap();
    let first_rev = quiz::order_revision(&pool, quiz_id).await.unwrap().unwrap();

    // Same list, same order: no write
    run_job(&pool, sheets, 50).await;
    assert_eq!(
        quiz::order_revision(&pool, quiz_id).await.unwrap().unwrap(),
        first_rev
    );

    // Reordered list: exactly one more write
    let sheets = SheetSet {
        questions: Some(write_sheet(&dir, "questions2.csv", questions)),
        lessons: Some(write_sheet(&dir, "lessons2.csv", lessons_ba)),
        ..Default::default()
    };
    run_job(&pool, sheets, 50).await;
    assert_eq!(
        quiz::order_revision(&pool, quiz_id).await.unwrap().unwrap(),
        first_rev + 1
    );

    let q1 = content::find_id_by_slug(&pool, "question", "q-one")
        .await
        .unwrap()
        .unwrap();
    let q2 = content::find_id_by_slug(&pool, "question", "q-two")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quiz::question_order(&pool, quiz_id).await.unwrap(), vec![q2, q1]);
}

#[tokio::test]
async fn pass_required_and_passmark_must_travel_together() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        lessons: Some(write_sheet(
            &dir,
            "lessons.csv",
            "id,lesson,pass required\nl1,Solo Lesson,1\n",
        )),
        ..Default::default()
    };

    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.counts.failed, 1);
    assert_eq!(
        content::find_id_by_slug(&pool, "lesson", "solo-lesson").await.unwrap(),
        None
    );

    let log = jobs::load_log(&pool, job.job_id).await.unwrap();
    assert_eq!(log[0].code, "validation");
    assert!(log[0].message.contains("passmark"), "message: {}", log[0].message);
}

#[tokio::test]
async fn multiple_choice_without_right_answer_is_rejected() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        questions: Some(write_sheet(
            &dir,
            "questions.csv",
            "id,question,type,answer\nq1,All wrong?,multiple-choice,\"wrong: A, wrong: B\"\n",
        )),
        ..Default::default()
    };

    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.counts.failed, 1);
    assert_eq!(
        content::find_id_by_slug(&pool, "question", "all-wrong").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn a_bad_row_does_not_abort_the_job() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        questions: Some(write_sheet(
            &dir,
            "questions.csv",
            "id,question,type,answer\nq1,,multi-line,a\nq2,Good question?,multi-line,b\n",
        )),
        ..Default::default()
    };

    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.counts.failed, 1);
    assert_eq!(job.counts.created, 1);
    assert!(content::find_id_by_slug(&pool, "question", "good-question")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn gap_fill_answers_use_the_segment_separator() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        questions: Some(write_sheet(
            &dir,
            "questions.csv",
            "id,question,type,answer,text before gap,gap,text after gap\n\
             q1,Fill the capital,gap-fill,France,Paris is the capital of,France,in Europe\n",
        )),
        ..Default::default()
    };

    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.counts.created, 1);

    let q = content::find_id_by_slug(&pool, "question", "fill-the-capital")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        content::get_meta(&pool, q, "_question_gap_fill").await.unwrap().as_deref(),
        Some("Paris is the capital of||France||in Europe")
    );
}

#[tokio::test]
async fn thumbnails_attach_remove_and_fail_hard() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    // URL image attaches on first sight
    let sheets = SheetSet {
        courses: Some(write_sheet(
            &dir,
            "courses.csv",
            "id,course,image\nc1,Baking,https://cdn.example.com/cover.png\n",
        )),
        ..Default::default()
    };
    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.counts.created, 1);

    let course_id = content::find_id_by_slug(&pool, "course", "baking")
        .await
        .unwrap()
        .unwrap();
    assert!(content::get_meta(&pool, course_id, "_thumbnail_id")
        .await
        .unwrap()
        .is_some());

    // An explicitly empty image column removes the thumbnail
    let sheets = SheetSet {
        courses: Some(write_sheet(&dir, "courses2.csv", "id,course,image\nc1,Baking,\n")),
        ..Default::default()
    };
    run_job(&pool, sheets, 50).await;
    assert!(content::get_meta(&pool, course_id, "_thumbnail_id")
        .await
        .unwrap()
        .is_none());

    // A filename that is not in the media library rejects the row
    let sheets = SheetSet {
        courses: Some(write_sheet(
            &dir,
            "courses3.csv",
            "id,course,image\nc2,Sourdough,missing.png\n",
        )),
        ..Default::default()
    };
    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.counts.failed, 1);
    assert_eq!(
        content::find_id_by_slug(&pool, "course", "sourdough").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn cancellation_is_honored_between_pages() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        courses: Some(write_sheet(
            &dir,
            "courses.csv",
            "id,course\nc1,First\nc2,Second\nc3,Third\n",
        )),
        ..Default::default()
    };

    let job = courseport_ingest::models::ImportJob::new(sheets);
    jobs::save_job(&pool, &job).await.unwrap();

    let orchestrator = Orchestrator::new(pool.clone(), 1);
    let job_after_page = orchestrator.process_next_page(job.job_id).await.unwrap();
    assert_eq!(job_after_page.state, JobState::Running);
    assert_eq!(job_after_page.counts.created, 1);

    jobs::request_cancel(&pool, job.job_id).await.unwrap();

    let cancelled = orchestrator.process_next_page(job.job_id).await.unwrap();
    assert_eq!(cancelled.state, JobState::Cancelled);

    // Already-synchronized entities are kept; nothing new was written
    assert!(content::find_id_by_slug(&pool, "course", "first").await.unwrap().is_some());
    assert!(content::find_id_by_slug(&pool, "course", "second").await.unwrap().is_none());
}

#[tokio::test]
async fn resolver_state_survives_an_orchestrator_restart() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    let sheets = SheetSet {
        courses: Some(write_sheet(&dir, "courses.csv", "id,course\nc1,Baking\n")),
        lessons: Some(write_sheet(
            &dir,
            "lessons.csv",
            "id,lesson,course\nl1,Kneading,c1\n",
        )),
        ..Default::default()
    };

    let job = courseport_ingest::models::ImportJob::new(sheets);
    jobs::save_job(&pool, &job).await.unwrap();

    // First orchestrator processes the course sheet, then goes away
    let first = Orchestrator::new(pool.clone(), 1);
    first.process_next_page(job.job_id).await.unwrap();
    drop(first);

    // A fresh orchestrator (restarted process) must still resolve c1
    let second = Orchestrator::new(pool.clone(), 1);
    let mut current = second.process_next_page(job.job_id).await.unwrap();
    for _ in 0..10 {
        if current.is_terminal() {
            break;
        }
        current = second.process_next_page(job.job_id).await.unwrap();
    }

    assert_eq!(current.state, JobState::Completed);
    assert_eq!(current.counts.failed, 0);

    let course_id = content::find_id_by_slug(&pool, "course", "baking")
        .await
        .unwrap()
        .unwrap();
    let lesson_id = content::find_id_by_slug(&pool, "lesson", "kneading")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        content::get_meta(&pool, lesson_id, "_lesson_course").await.unwrap(),
        Some(course_id.to_string())
    );
}

#[tokio::test]
async fn sanitizer_warnings_carry_the_entity_id() {
    let pool = test_pool().await;
    let dir = TempDir::new().unwrap();

    // "featured" gets a near-miss boolean: entity still lands, warning logged
    let sheets = SheetSet {
        courses: Some(write_sheet(
            &dir,
            "courses.csv",
            "id,course,featured\nc1,Baking,yes\n",
        )),
        ..Default::default()
    };

    let job = run_job(&pool, sheets, 50).await;
    assert_eq!(job.counts.created, 1);
    assert_eq!(job.counts.failed, 0);

    let course_id = content::find_id_by_slug(&pool, "course", "baking")
        .await
        .unwrap()
        .unwrap();

    let log = jobs::load_log(&pool, job.job_id).await.unwrap();
    let warning = log
        .iter()
        .find(|entry| entry.severity == LogSeverity::Warning)
        .expect("sanitize warning logged");
    assert_eq!(warning.code, "sanitize");
    assert_eq!(warning.field.as_deref(), Some("featured"));
    assert_eq!(warning.item_id, Some(course_id));
    assert_eq!(warning.line, 2);
}
