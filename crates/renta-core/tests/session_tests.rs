mod common;

use common::{FlakyStore, ScriptedGateway};
use renta_core::{
    Field, FormSession, FormStore, GatewayError, MergePolicy, Role, SessionError,
    SessionOptions, SessionStore, TranscriptStore, WriteStage,
};
use std::sync::Arc;

const SUBJECT: &str = "user-1";

fn open(store: &Arc<FlakyStore>, gateway: &Arc<ScriptedGateway>) -> FormSession {
    open_with(store, gateway, SessionOptions::default())
}

fn open_with(
    store: &Arc<FlakyStore>,
    gateway: &Arc<ScriptedGateway>,
    options: SessionOptions,
) -> FormSession {
    let store: Arc<dyn SessionStore> = store.clone();
    FormSession::open(SUBJECT, store, gateway.clone(), options).unwrap()
}

#[tokio::test]
async fn test_new_subject_is_seeded_once() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());

    let session = open(&store, &gateway);
    let roles: Vec<Role> = session.transcript().messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::Assistant]);
    assert!(session.visible_messages().all(|m| m.role != Role::System));
    assert!(!session.has_conversation());
    assert!(session.is_synced());

    drop(session);
    let reopened = open(&store, &gateway);
    assert_eq!(reopened.transcript().len(), 2);
    assert_eq!(store.load(SUBJECT).unwrap().len(), 2);
}

#[tokio::test]
async fn test_id_token_round_trip() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Gracias, ¿algo más?");
    let mut session = open(&store, &gateway);

    let result = session.send("Mi DNI es 12345678Z").await.unwrap();

    assert_eq!(result.reply, "Gracias, ¿algo más?");
    assert_eq!(result.changed, vec![Field::Identification]);
    assert_eq!(result.progress.percent_complete, 10);
    assert_eq!(session.form().get(Field::Identification), Some("12345678Z"));

    let stored = store.load_form(SUBJECT).unwrap().unwrap();
    assert_eq!(stored.get(Field::Identification), Some("12345678Z"));

    let messages = store.load(SUBJECT).unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].role, Role::User);
    assert_eq!(messages[3].role, Role::Assistant);
    assert!(session.has_conversation());
}

#[tokio::test]
async fn test_gateway_receives_whole_transcript() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("primera").reply("segunda");
    let mut session = open(&store, &gateway);

    session.send("hola").await.unwrap();
    session.send("otra vez").await.unwrap();

    let sent = gateway.last_transcript();
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(sent[4].content, "otra vez");
    let sequences: Vec<u64> = sent.iter().map(|m| m.sequence).collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_full_name_from_prompted_reply() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Perfecto. ¿Me indicas tu nombre completo?");
    let mut session = open(&store, &gateway);

    let result = session.send("Juan Pérez García").await.unwrap();

    assert_eq!(result.changed, vec![Field::FirstName, Field::LastName]);
    assert_eq!(session.form().get(Field::FirstName), Some("Juan"));
    assert_eq!(session.form().get(Field::LastName), Some("Pérez García"));
    assert_eq!(result.progress.percent_complete, 20);
}

#[tokio::test]
async fn test_exchange_without_candidates_skips_form_write() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("De acuerdo");
    let mut session = open(&store, &gateway);

    let result = session.send("Sí, el año pasado también").await.unwrap();

    assert!(result.candidates.is_empty());
    assert!(result.changed.is_empty());
    assert_eq!(store.form_writes(), 0);
    assert_eq!(store.load_form(SUBJECT).unwrap(), None);
}

#[tokio::test]
async fn test_repeated_value_is_not_rewritten() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Anotado").reply("Ya lo tenía");
    let mut session = open(&store, &gateway);

    session.send("12345678Z").await.unwrap();
    let second = session.send("repito: 12345678Z").await.unwrap();

    assert_eq!(second.candidates.len(), 1);
    assert!(second.changed.is_empty());
    assert_eq!(store.form_writes(), 1);
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let mut session = open(&store, &gateway);

    let err = session.send("   \n").await.unwrap_err();

    assert!(matches!(err, SessionError::EmptyMessage));
    assert_eq!(gateway.calls(), 0);
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn test_gateway_failure_keeps_user_message_only() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.fail(GatewayError::RemoteUnavailable("timeout".into()));
    let mut session = open(&store, &gateway);

    let err = session.send("Mi DNI es 12345678Z").await.unwrap_err();

    assert!(matches!(err, SessionError::Gateway(GatewayError::RemoteUnavailable(_))));
    assert_eq!(err.notice(), "No se pudo procesar tu mensaje");
    let last = session.transcript().messages().last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(session.form().is_empty());
    assert_eq!(store.form_writes(), 0);
    assert_eq!(store.load(SUBJECT).unwrap().len(), 3);
    assert!(session.is_synced());
}

#[tokio::test]
async fn test_retry_answers_pending_message() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .fail(GatewayError::RateLimited("slow down".into()))
        .reply("Gracias");
    let mut session = open(&store, &gateway);

    let err = session.send("12345678Z").await.unwrap_err();
    assert!(matches!(err, SessionError::Gateway(GatewayError::RateLimited(_))));

    let result = session.retry().await.unwrap();
    assert_eq!(result.changed, vec![Field::Identification]);
    assert_eq!(store.load(SUBJECT).unwrap().len(), 4);

    let again = session.retry().await.unwrap_err();
    assert!(matches!(again, SessionError::NothingPending));
}

#[tokio::test]
async fn test_unrecorded_user_message_is_not_sent() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("no debería llegar");
    let mut session = open(&store, &gateway);
    FlakyStore::set(&store.fail_user_appends, true);

    let err = session.send("  12345678Z  ").await.unwrap_err();

    match err {
        SessionError::NotSent { text, .. } => assert_eq!(text, "12345678Z"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(gateway.calls(), 0);
    assert_eq!(session.transcript().len(), 2);
    assert!(session.form().is_empty());
}

#[tokio::test]
async fn test_reply_write_failure_stays_applied_until_sync() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Gracias");
    let mut session = open(&store, &gateway);
    FlakyStore::set(&store.fail_assistant_appends, true);

    let err = session.send("12345678Z").await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Persistence {
            stage: WriteStage::Transcript,
            ..
        }
    ));
    assert_eq!(session.transcript().len(), 4);
    assert_eq!(session.form().get(Field::Identification), Some("12345678Z"));
    assert!(!session.is_synced());
    // The form waits for the transcript
    assert_eq!(store.form_writes(), 0);
    assert_eq!(store.load(SUBJECT).unwrap().len(), 3);

    FlakyStore::set(&store.fail_assistant_appends, false);
    session.sync().unwrap();

    assert!(session.is_synced());
    assert_eq!(store.load(SUBJECT).unwrap().len(), 4);
    let stored = store.load_form(SUBJECT).unwrap().unwrap();
    assert_eq!(stored.get(Field::Identification), Some("12345678Z"));
}

#[tokio::test]
async fn test_next_send_flushes_pending_reply_first() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("uno").reply("dos");
    let mut session = open(&store, &gateway);

    FlakyStore::set(&store.fail_assistant_appends, true);
    assert!(session.send("hola").await.is_err());
    FlakyStore::set(&store.fail_assistant_appends, false);

    session.send("sigo aquí").await.unwrap();

    let contents: Vec<String> = store
        .load(SUBJECT)
        .unwrap()
        .into_iter()
        .skip(2)
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["hola", "uno", "sigo aquí", "dos"]);
}

#[tokio::test]
async fn test_form_write_failure_is_reported() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Gracias");
    let mut session = open(&store, &gateway);
    FlakyStore::set(&store.fail_form_writes, true);

    let err = session.send("12345678Z").await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Persistence {
            stage: WriteStage::Form,
            ..
        }
    ));
    assert_eq!(store.load(SUBJECT).unwrap().len(), 4);
    assert!(!session.is_synced());

    FlakyStore::set(&store.fail_form_writes, false);
    session.sync().unwrap();
    assert_eq!(store.form_writes(), 1);
}

#[tokio::test]
async fn test_review_edit_and_save() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let mut session = open(&store, &gateway);

    session.edit_field(Field::City, " Madrid ").unwrap();
    session.edit_field(Field::EmploymentIncome, "25000,50").unwrap();
    let err = session.edit_field(Field::CapitalGains, "mucho").unwrap_err();
    assert!(matches!(err, SessionError::InvalidValue { field: Field::CapitalGains, .. }));
    assert!(!session.is_synced());

    session.save_form().unwrap();

    let stored = store.load_form(SUBJECT).unwrap().unwrap();
    assert_eq!(stored.get(Field::City), Some("Madrid"));
    assert_eq!(stored.get(Field::EmploymentIncome), Some("25000,50"));
    assert!(stored.is_manual(Field::City));
    assert_eq!(session.progress().percent_complete, 20);
}

#[tokio::test]
async fn test_last_write_wins_over_manual_edit() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Anotado");
    let mut session = open(&store, &gateway);

    session.edit_field(Field::Identification, "00000000T").unwrap();
    session.send("12345678Z").await.unwrap();

    assert_eq!(session.form().get(Field::Identification), Some("12345678Z"));
    assert!(!session.form().is_manual(Field::Identification));
}

#[tokio::test]
async fn test_preserve_manual_keeps_reviewed_value() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Anotado");
    let options = SessionOptions {
        policy: MergePolicy::PreserveManual,
        ..SessionOptions::default()
    };
    let mut session = open_with(&store, &gateway, options);

    session.edit_field(Field::Identification, "00000000T").unwrap();
    let result = session.send("12345678Z").await.unwrap();

    assert!(result.changed.is_empty());
    assert_eq!(session.form().get(Field::Identification), Some("00000000T"));
}

#[tokio::test]
async fn test_form_survives_reopen() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.reply("Gracias");
    let mut session = open(&store, &gateway);
    session.send("12345678Z").await.unwrap();
    drop(session);

    let reopened = open(&store, &gateway);
    assert_eq!(reopened.form().get(Field::Identification), Some("12345678Z"));
    assert_eq!(reopened.transcript().len(), 4);
    assert!(reopened.has_conversation());
}

#[tokio::test]
async fn test_onboarding_flag() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let session = open(&store, &gateway);

    assert!(!session.onboarding_completed().unwrap());
    session.complete_onboarding().unwrap();
    assert!(session.onboarding_completed().unwrap());
}

#[tokio::test]
async fn test_export_pdf_writes_document() {
    let store = Arc::new(FlakyStore::new());
    let gateway = Arc::new(ScriptedGateway::new());
    let mut session = open(&store, &gateway);
    session.edit_field(Field::FirstName, "Juan").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("declaracion.pdf");
    session.export_pdf(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.5"));
    assert!(session.render().lines().any(|l| l.contains("Juan")));
}
