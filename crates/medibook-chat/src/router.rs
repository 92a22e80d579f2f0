//! Message router: the single entry point of the conversational core.
//!
//! Branches are tried in a fixed order and exactly one produces the reply:
//! safety refusal, open booking session, booking or list keywords, FAQ,
//! generative backend, then the idle help prompt. Booking keywords and FAQ
//! can swap places through `faq.faq_before_booking`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use medibook_core::config::MedibookConfig;
use medibook_core::safety::SafetyFilter;
use medibook_core::store::{AppointmentStore, ChatLog, UserLease, UserStore};
use medibook_core::types::User;

use crate::booking::{keywords, BookingFlowEngine};
use crate::error::ChatError;
use crate::faq::FaqMatcher;
use crate::generative::{GenerationRequest, GenerativeBackend};
use crate::memory::ConversationMemory;
use crate::types::{Reasoning, RouterReply, StreamEvent};

/// Events buffered between the generation task and the consumer.
const STREAM_BUFFER: usize = 32;

/// Streamed reply: fragments followed by one `Done` or `Error`.
pub type ReplyStream = ReceiverStream<StreamEvent>;

enum Decision {
    /// Blocked by the safety filter; nothing is logged.
    Refused(RouterReply),
    Reply(RouterReply),
    /// Try the generative backend, falling back to the idle prompt.
    Generate,
}

/// Routes each message to exactly one handler.
pub struct IntentRouter {
    users: Arc<dyn UserStore>,
    safety: SafetyFilter,
    booking: BookingFlowEngine,
    faq: FaqMatcher,
    memory: ConversationMemory,
    generative: Option<Arc<dyn GenerativeBackend>>,
    generative_timeout: Duration,
    max_message_length: usize,
    faq_before_booking: bool,
}

impl IntentRouter {
    pub fn new(
        config: &MedibookConfig,
        users: Arc<dyn UserStore>,
        appointments: Arc<dyn AppointmentStore>,
        log: Arc<dyn ChatLog>,
    ) -> Self {
        Self {
            booking: BookingFlowEngine::new(Arc::clone(&users), appointments),
            users,
            safety: SafetyFilter::new(config.safety.clone()),
            faq: FaqMatcher::with_default_corpus(&config.faq),
            memory: ConversationMemory::new(log, config.chat.memory_window),
            generative: None,
            generative_timeout: Duration::from_secs(config.generative.timeout_secs.max(1)),
            max_message_length: config.chat.max_message_length,
            faq_before_booking: config.faq.faq_before_booking,
        }
    }

    pub fn with_generative(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.generative = Some(backend);
        self
    }

    pub fn with_faq(mut self, faq: FaqMatcher) -> Self {
        self.faq = faq;
        self
    }

    /// Pin the booking calendar to a fixed day.
    pub fn with_today(mut self, today: chrono::NaiveDate) -> Self {
        self.booking = self.booking.with_today(today);
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Handle one message and return the complete reply.
    ///
    /// The user's lease is held for the whole call, so two messages from the
    /// same user never interleave their read-modify-write.
    pub async fn handle_message(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<RouterReply, ChatError> {
        let _lease = self.users.lock(user_id).await;
        let user = self.load_user(user_id)?;
        self.validate(text)?;

        let reply = match self.decide(&user, text)? {
            Decision::Refused(reply) => return Ok(reply),
            Decision::Reply(reply) => reply,
            Decision::Generate => match self.generate(&user, text).await? {
                Some(generated) => RouterReply::new(generated, Reasoning::Generative),
                None => self.default_reply(),
            },
        };

        self.remember(user_id, text, &reply.to_user)?;
        Ok(reply)
    }

    /// Handle one message, delivering the reply incrementally.
    ///
    /// Only the generative branch streams more than one fragment. If the
    /// consumer drops the stream before the final event, the generated text
    /// is not written to history.
    pub async fn handle_message_stream(
        self: &Arc<Self>,
        user_id: &str,
        text: &str,
    ) -> Result<ReplyStream, ChatError> {
        let lease = self.users.lock(user_id).await;
        let user = self.load_user(user_id)?;
        self.validate(text)?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        match self.decide(&user, text)? {
            Decision::Refused(reply) => send_whole(&tx, reply).await,
            Decision::Reply(reply) => {
                self.remember(user_id, text, &reply.to_user)?;
                send_whole(&tx, reply).await;
            }
            Decision::Generate => {
                let router = Arc::clone(self);
                let text = text.to_string();
                tokio::spawn(async move {
                    router.stream_generative(lease, user, text, tx).await;
                });
            }
        }
        Ok(ReceiverStream::new(rx))
    }

    fn load_user(&self, user_id: &str) -> Result<User, ChatError> {
        self.users
            .get(user_id)?
            .ok_or_else(|| ChatError::UserNotFound(user_id.to_string()))
    }

    fn validate(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }
        Ok(())
    }

    fn decide(&self, user: &User, text: &str) -> Result<Decision, ChatError> {
        if let Some(violation) = self.safety.check(text) {
            info!(user_id = %user.user_id, term = %violation.term, "Message refused");
            return Ok(Decision::Refused(RouterReply::new(
                self.safety.refusal_message(),
                Reasoning::Safety {
                    term: violation.term,
                },
            )));
        }

        if !user.state.is_idle() {
            let outcome = self.booking.handle(user, text)?;
            return Ok(Decision::Reply(
                RouterReply::new(outcome.reply, Reasoning::Booking(user.state))
                    .with_action(outcome.action),
            ));
        }

        if self.faq_before_booking {
            if let Some(reply) = self.faq_reply(text) {
                return Ok(Decision::Reply(reply));
            }
        }

        let wants_list = keywords::is_list_request(text);
        if wants_list || keywords::is_booking_intent(text) {
            let reasoning = if wants_list {
                Reasoning::AppointmentList
            } else {
                Reasoning::BookingIntent
            };
            let outcome = self.booking.handle(user, text)?;
            return Ok(Decision::Reply(
                RouterReply::new(outcome.reply, reasoning).with_action(outcome.action),
            ));
        }

        if !self.faq_before_booking {
            if let Some(reply) = self.faq_reply(text) {
                return Ok(Decision::Reply(reply));
            }
        }

        if self.generative.is_some() {
            return Ok(Decision::Generate);
        }
        Ok(Decision::Reply(self.default_reply()))
    }

    fn faq_reply(&self, text: &str) -> Option<RouterReply> {
        let found = self.faq.find_answer(text);
        debug!(score = found.score, matched = found.answer.is_some(), "FAQ lookup");
        found
            .answer
            .map(|answer| RouterReply::faq(answer, found.score))
    }

    fn default_reply(&self) -> RouterReply {
        RouterReply::new(self.booking.default_reply(), Reasoning::BookingDefault)
    }

    fn remember(&self, user_id: &str, text: &str, reply: &str) -> Result<(), ChatError> {
        self.memory.add_user_message(user_id, text)?;
        self.memory.add_assistant_message(user_id, reply)?;
        Ok(())
    }

    fn generation_request(
        &self,
        user: &User,
        text: &str,
    ) -> Result<GenerationRequest, ChatError> {
        Ok(GenerationRequest {
            input: text.to_string(),
            context: self.memory.get_recent_messages(&user.user_id, None)?,
            summary: self.memory.get_summary(&user.user_id)?,
            user_name: user.name.clone(),
        })
    }

    /// One-shot generation. `None` means the branch is skipped.
    async fn generate(&self, user: &User, text: &str) -> Result<Option<String>, ChatError> {
        let Some(backend) = &self.generative else {
            return Ok(None);
        };
        let request = self.generation_request(user, text)?;

        match timeout(self.generative_timeout, backend.generate(&request)).await {
            Ok(Ok(generated)) if !generated.trim().is_empty() => Ok(Some(generated)),
            Ok(Ok(_)) => {
                warn!(user_id = %user.user_id, "Generative backend returned empty text");
                Ok(None)
            }
            Ok(Err(e)) => {
                warn!(user_id = %user.user_id, error = %e, "Generative backend unavailable");
                Ok(None)
            }
            Err(_) => {
                warn!(
                    user_id = %user.user_id,
                    timeout_secs = self.generative_timeout.as_secs(),
                    "Generative backend timed out"
                );
                Ok(None)
            }
        }
    }

    async fn stream_generative(
        self: Arc<Self>,
        _lease: UserLease,
        user: User,
        text: String,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        match self.relay_generation(&user, &text, &tx).await {
            Ok(Some(reply)) => {
                let _ = tx.send(StreamEvent::Done(reply)).await;
            }
            Ok(None) => {
                debug!(user_id = %user.user_id, "Stream consumer went away");
            }
            Err(e) => {
                error!(user_id = %user.user_id, error = %e, "Streaming reply failed");
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            }
        }
    }

    /// Forward generated chunks to `tx` and commit the text once complete.
    ///
    /// Falls back to the idle prompt when no chunk arrives. Returns `None`
    /// when the consumer is gone, in which case nothing is committed.
    async fn relay_generation(
        &self,
        user: &User,
        text: &str,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<Option<RouterReply>, ChatError> {
        let Some(backend) = &self.generative else {
            return self.relay_default(user, text, tx).await;
        };
        let request = self.generation_request(user, text)?;

        let mut stream =
            match timeout(self.generative_timeout, backend.generate_stream(&request)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    warn!(user_id = %user.user_id, error = %e, "Generative backend unavailable");
                    return self.relay_default(user, text, tx).await;
                }
                Err(_) => {
                    warn!(user_id = %user.user_id, "Generative backend timed out");
                    return self.relay_default(user, text, tx).await;
                }
            };

        let mut full = String::new();
        loop {
            match timeout(self.generative_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    full.push_str(&chunk);
                    if tx.send(StreamEvent::Fragment(chunk)).await.is_err() {
                        return Ok(None);
                    }
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    warn!(user_id = %user.user_id, error = %e, "Generation stream failed");
                    break;
                }
                Err(_) => {
                    warn!(user_id = %user.user_id, "Generation stream stalled");
                    break;
                }
            }
        }

        if full.is_empty() {
            return self.relay_default(user, text, tx).await;
        }
        if tx.is_closed() {
            return Ok(None);
        }
        self.remember(&user.user_id, text, &full)?;
        Ok(Some(RouterReply::new(full, Reasoning::Generative)))
    }

    async fn relay_default(
        &self,
        user: &User,
        text: &str,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<Option<RouterReply>, ChatError> {
        let reply = self.default_reply();
        if tx
            .send(StreamEvent::Fragment(reply.to_user.clone()))
            .await
            .is_err()
        {
            return Ok(None);
        }
        self.remember(&user.user_id, text, &reply.to_user)?;
        Ok(Some(reply))
    }
}

async fn send_whole(tx: &mpsc::Sender<StreamEvent>, reply: RouterReply) {
    // The receiver is still owned by the caller, so these cannot fail.
    let _ = tx.send(StreamEvent::Fragment(reply.to_user.clone())).await;
    let _ = tx.send(StreamEvent::Done(reply)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use futures_util::stream;
    use medibook_core::config::FaqConfig;
    use medibook_core::types::{BookingState, ChatRole, PendingBooking};
    use medibook_storage::{AppointmentRepository, ChatLogRepository, Database, UserRepository};

    use crate::actions::execute_action;
    use crate::error::GenerativeError;
    use crate::faq::{corpus, FaqEntry};
    use crate::generative::TextStream;
    use crate::types::Action;

    // ---- Test doubles ----

    #[derive(Clone)]
    enum Script {
        Reply(Vec<&'static str>),
        Fail,
        Hang,
        /// Yields the chunks, then a transport error.
        PartialThenFail(Vec<&'static str>),
        /// Chunk `i` arrives after `i` seconds.
        Slow(Vec<&'static str>),
    }

    struct ScriptedBackend(Script);

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, GenerativeError> {
            match &self.0 {
                Script::Reply(chunks) | Script::Slow(chunks) => Ok(chunks.concat()),
                Script::Fail | Script::PartialThenFail(_) => {
                    Err(GenerativeError::Transport("connection refused".to_string()))
                }
                Script::Hang => std::future::pending().await,
            }
        }

        async fn generate_stream(
            &self,
            _: &GenerationRequest,
        ) -> Result<TextStream, GenerativeError> {
            match self.0.clone() {
                Script::Reply(chunks) => Ok(Box::pin(stream::iter(
                    chunks.into_iter().map(|c| Ok(c.to_string())),
                ))),
                Script::Fail => Err(GenerativeError::Status(503)),
                Script::Hang => std::future::pending().await,
                Script::PartialThenFail(chunks) => Ok(Box::pin(
                    stream::iter(chunks.into_iter().map(|c| Ok(c.to_string()))).chain(
                        stream::once(async {
                            Err(GenerativeError::Transport("reset".to_string()))
                        }),
                    ),
                )),
                Script::Slow(chunks) => Ok(Box::pin(
                    stream::iter(chunks.into_iter().enumerate()).then(|(i, c)| async move {
                        tokio::time::sleep(Duration::from_secs(i as u64)).await;
                        Ok(c.to_string())
                    }),
                )),
            }
        }
    }

    struct Harness {
        router: Arc<IntentRouter>,
        users: Arc<UserRepository>,
        appointments: Arc<AppointmentRepository>,
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
    }

    fn build(config: MedibookConfig, script: Option<Script>, faq: Option<FaqMatcher>) -> Harness {
        let db = Arc::new(Database::in_memory().unwrap());
        let users = Arc::new(UserRepository::new(Arc::clone(&db)));
        let appointments = Arc::new(AppointmentRepository::new(Arc::clone(&db)));
        let log = Arc::new(ChatLogRepository::new(db));
        users.create("u-1", "Ana").unwrap();

        let mut router = IntentRouter::new(&config, users.clone(), appointments.clone(), log)
            .with_today(today());
        if let Some(script) = script {
            router = router.with_generative(Arc::new(ScriptedBackend(script)));
        }
        if let Some(faq) = faq {
            router = router.with_faq(faq);
        }
        Harness {
            router: Arc::new(router),
            users,
            appointments,
        }
    }

    fn harness() -> Harness {
        build(MedibookConfig::default(), None, None)
    }

    fn with_backend(script: Script) -> Harness {
        build(MedibookConfig::default(), Some(script), None)
    }

    impl Harness {
        async fn send(&self, text: &str) -> RouterReply {
            self.router.handle_message("u-1", text).await.unwrap()
        }

        fn user(&self) -> User {
            self.users.get("u-1").unwrap().unwrap()
        }

        fn put(&self, state: BookingState, pending: PendingBooking) {
            self.users.set_state("u-1", state, &pending).unwrap();
        }

        fn history(&self) -> Vec<(ChatRole, String)> {
            self.router
                .memory()
                .get_recent_messages("u-1", Some(100))
                .unwrap()
                .into_iter()
                .map(|m| (m.role, m.content))
                .collect()
        }

        async fn stream(&self, text: &str) -> Vec<StreamEvent> {
            self.router
                .handle_message_stream("u-1", text)
                .await
                .unwrap()
                .collect()
                .await
        }
    }

    fn help_text() -> String {
        crate::booking::prompts::render(crate::booking::prompts::Prompt::Greeting)
    }

    // ---- Validation ----

    #[tokio::test]
    async fn test_unknown_user() {
        let h = harness();
        let err = h.router.handle_message("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, ChatError::UserNotFound(ref id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let h = harness();
        let err = h.router.handle_message("u-1", "   ").await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(h.history().is_empty());
    }

    #[tokio::test]
    async fn test_long_message_rejected() {
        let h = harness();
        let long = "a".repeat(2001);
        let err = h.router.handle_message("u-1", &long).await.unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(2000)));
    }

    // ---- Safety ----

    #[tokio::test]
    async fn test_denylisted_message_refused_without_logging() {
        let h = harness();
        let reply = h.send("you are STUPID").await;
        assert_eq!(reply.to_user, SafetyFilter::default().refusal_message());
        assert_eq!(
            reply.reasoning,
            Reasoning::Safety {
                term: "stupid".to_string()
            }
        );
        assert_eq!(h.user().state, BookingState::Idle);
        assert!(h.history().is_empty());
    }

    #[tokio::test]
    async fn test_safety_precedes_open_session() {
        let h = harness();
        h.put(
            BookingState::AwaitingDate,
            PendingBooking {
                specialty: Some("Cardiology".to_string()),
                ..PendingBooking::default()
            },
        );
        let reply = h.send("I will kill you tomorrow").await;
        assert!(matches!(reply.reasoning, Reasoning::Safety { .. }));
        assert_eq!(h.user().state, BookingState::AwaitingDate);
    }

    // ---- Booking ----

    #[tokio::test]
    async fn test_booking_intent_from_idle() {
        let h = harness();
        let reply = h.send("I want an appointment").await;
        assert_eq!(reply.reasoning, Reasoning::BookingIntent);
        assert_eq!(h.user().state, BookingState::AwaitingSpecialty);
        assert_eq!(
            h.history(),
            vec![
                (ChatRole::User, "I want an appointment".to_string()),
                (ChatRole::Assistant, reply.to_user.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_tomorrow_in_awaiting_date() {
        let h = harness();
        h.put(
            BookingState::AwaitingDate,
            PendingBooking {
                specialty: Some("Cardiology".to_string()),
                ..PendingBooking::default()
            },
        );
        let reply = h.send("tomorrow").await;
        assert_eq!(reply.reasoning, Reasoning::Booking(BookingState::AwaitingDate));
        assert_eq!(reply.reasoning.to_string(), "booking:awaiting_date");
        let user = h.user();
        assert_eq!(user.state, BookingState::AwaitingTime);
        assert_eq!(user.pending.date, NaiveDate::from_ymd_opt(2026, 1, 11));
    }

    #[tokio::test]
    async fn test_bad_time_keeps_state() {
        let h = harness();
        h.put(
            BookingState::AwaitingTime,
            PendingBooking {
                specialty: Some("Cardiology".to_string()),
                date: NaiveDate::from_ymd_opt(2026, 1, 15),
                time: None,
            },
        );
        let reply = h.send("25:00").await;
        assert_eq!(h.user().state, BookingState::AwaitingTime);
        assert!(reply.to_user.contains("couldn't read that time"));
    }

    #[tokio::test]
    async fn test_open_session_takes_precedence_over_faq() {
        let h = harness();
        h.put(BookingState::AwaitingSpecialty, PendingBooking::default());
        let reply = h.send("what payment methods do you accept").await;
        assert_eq!(
            reply.reasoning,
            Reasoning::Booking(BookingState::AwaitingSpecialty)
        );
        assert!(!reply.is_faq_response);
        assert_eq!(h.user().state, BookingState::AwaitingDate);
    }

    #[tokio::test]
    async fn test_list_from_idle() {
        let h = harness();
        let reply = h.send("show my appointments").await;
        assert_eq!(reply.reasoning, Reasoning::AppointmentList);
        assert!(reply.to_user.contains("no scheduled appointments"));
        assert_eq!(h.user().state, BookingState::Idle);
    }

    #[tokio::test]
    async fn test_confirmation_round_trip_with_action() {
        let h = harness();
        h.send("book an appointment").await;
        h.send("cardiology").await;
        h.send("2026-01-15").await;
        h.send("09:00").await;
        let reply = h.send("yes").await;

        let list = h.appointments.list_by_user("u-1").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].specialty, "Cardiology");
        assert_eq!(list[0].time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());

        let action = reply.action.clone().unwrap();
        assert!(matches!(
            &action,
            Action::NotifyPatient { appointment_id, .. } if *appointment_id == list[0].appointment_id
        ));
        assert!(execute_action(Some(&action)).success);

        let listed = h.send("my appointments").await;
        assert!(listed.to_user.contains("1. Cardiology"));
    }

    // ---- FAQ ----

    #[tokio::test]
    async fn test_payment_methods_faq() {
        let h = harness();
        let reply = h.send("what payment methods do you accept").await;
        assert!(reply.is_faq_response);
        assert_eq!(reply.to_user, corpus::default_corpus()[0].answer);
        let similarity = reply.faq_similarity.unwrap();
        assert!(similarity >= FaqConfig::default().threshold);
        assert_eq!(reply.reasoning, Reasoning::Faq { similarity });
        assert_eq!(h.history().len(), 2);
    }

    fn booking_faq(config: &FaqConfig) -> FaqMatcher {
        FaqMatcher::new(
            vec![FaqEntry {
                question: "how do I book online".to_string(),
                variations: vec![],
                answer: "Just chat with me.".to_string(),
            }],
            config,
        )
    }

    #[tokio::test]
    async fn test_booking_keywords_precede_faq_by_default() {
        let config = MedibookConfig::default();
        let faq = booking_faq(&config.faq);
        let h = build(config, None, Some(faq));
        let reply = h.send("how do I book online").await;
        assert_eq!(reply.reasoning, Reasoning::BookingIntent);
    }

    #[tokio::test]
    async fn test_faq_first_policy() {
        let mut config = MedibookConfig::default();
        config.faq.faq_before_booking = true;
        let faq = booking_faq(&config.faq);
        let h = build(config, None, Some(faq));
        let reply = h.send("how do I book online").await;
        assert!(reply.is_faq_response);
        assert_eq!(reply.to_user, "Just chat with me.");
        assert_eq!(h.user().state, BookingState::Idle);
    }

    // ---- Generative fallback ----

    #[tokio::test]
    async fn test_no_backend_uses_help_prompt() {
        let h = harness();
        let reply = h.send("any parking spots nearby").await;
        assert_eq!(reply.reasoning, Reasoning::BookingDefault);
        assert_eq!(reply.to_user, help_text());
        assert_eq!(h.history().len(), 2);
    }

    #[tokio::test]
    async fn test_generative_reply() {
        let h = with_backend(Script::Reply(vec!["Street ", "parking is free."]));
        let reply = h.send("any parking spots nearby").await;
        assert_eq!(reply.reasoning, Reasoning::Generative);
        assert_eq!(reply.to_user, "Street parking is free.");
        assert_eq!(
            h.history().last().cloned(),
            Some((ChatRole::Assistant, "Street parking is free.".to_string()))
        );
    }

    #[tokio::test]
    async fn test_generative_failure_falls_through() {
        let h = with_backend(Script::Fail);
        let reply = h.send("any parking spots nearby").await;
        assert_eq!(reply.reasoning, Reasoning::BookingDefault);
        assert_eq!(reply.to_user, help_text());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generative_timeout_falls_through() {
        let h = with_backend(Script::Hang);
        let reply = h.send("any parking spots nearby").await;
        assert_eq!(reply.reasoning, Reasoning::BookingDefault);
    }

    #[tokio::test]
    async fn test_generative_not_used_for_booking() {
        let h = with_backend(Script::Reply(vec!["nope"]));
        let reply = h.send("I want an appointment").await;
        assert_eq!(reply.reasoning, Reasoning::BookingIntent);
    }

    // ---- Streaming ----

    fn fragments(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Fragment(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn done(events: &[StreamEvent]) -> RouterReply {
        match events.last() {
            Some(StreamEvent::Done(reply)) => reply.clone(),
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_faq_is_single_fragment() {
        let h = harness();
        let events = h.stream("what payment methods do you accept").await;
        assert_eq!(events.len(), 2);
        let reply = done(&events);
        assert!(reply.is_faq_response);
        assert_eq!(fragments(&events), reply.to_user);
    }

    #[tokio::test]
    async fn test_stream_refusal_not_logged() {
        let h = harness();
        let events = h.stream("bomb").await;
        assert!(matches!(done(&events).reasoning, Reasoning::Safety { .. }));
        assert!(h.history().is_empty());
    }

    #[tokio::test]
    async fn test_stream_generative_chunks() {
        let h = with_backend(Script::Reply(vec!["Hel", "lo", " there"]));
        let events = h.stream("any parking spots nearby").await;
        assert_eq!(events.len(), 4);
        let reply = done(&events);
        assert_eq!(reply.reasoning, Reasoning::Generative);
        assert_eq!(reply.to_user, "Hello there");
        assert_eq!(fragments(&events), "Hello there");
        assert_eq!(
            h.history(),
            vec![
                (ChatRole::User, "any parking spots nearby".to_string()),
                (ChatRole::Assistant, "Hello there".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_failure_before_first_chunk_falls_through() {
        let h = with_backend(Script::Fail);
        let events = h.stream("any parking spots nearby").await;
        let reply = done(&events);
        assert_eq!(reply.reasoning, Reasoning::BookingDefault);
        assert_eq!(fragments(&events), help_text());
        assert_eq!(h.history().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_failure_after_partial_commits_partial() {
        let h = with_backend(Script::PartialThenFail(vec!["Street ", "parking"]));
        let events = h.stream("any parking spots nearby").await;
        let reply = done(&events);
        assert_eq!(reply.to_user, "Street parking");
        assert_eq!(fragments(&events), "Street parking");
        assert_eq!(
            h.history().last().cloned(),
            Some((ChatRole::Assistant, "Street parking".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_abandoned_by_consumer_is_not_committed() {
        let h = with_backend(Script::Slow(vec!["first", "second", "third"]));
        let mut stream = h
            .router
            .handle_message_stream("u-1", "any parking spots nearby")
            .await
            .unwrap();
        assert_eq!(
            stream.next().await,
            Some(StreamEvent::Fragment("first".to_string()))
        );
        drop(stream);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.history().is_empty());

        // The lease was released with the abandoned task.
        let reply = h.send("show my appointments").await;
        assert_eq!(reply.reasoning, Reasoning::AppointmentList);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_fallback_abandoned_by_consumer_is_not_committed() {
        let h = with_backend(Script::Hang);
        let stream = h
            .router
            .handle_message_stream("u-1", "any parking spots nearby")
            .await
            .unwrap();
        drop(stream);

        // Past the generation timeout, so the idle reply would be relayed.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(h.history().is_empty());
    }

    // ---- Per-user exclusion ----

    #[tokio::test]
    async fn test_message_waits_for_user_lease() {
        let h = harness();
        let lease = h.users.lock("u-1").await;

        let router = Arc::clone(&h.router);
        let pending =
            tokio::spawn(async move { router.handle_message("u-1", "I want an appointment").await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());
        assert_eq!(h.user().state, BookingState::Idle);

        drop(lease);
        let reply = pending.await.unwrap().unwrap();
        assert_eq!(reply.reasoning, Reasoning::BookingIntent);
        assert_eq!(h.user().state, BookingState::AwaitingSpecialty);
    }

    #[tokio::test]
    async fn test_other_users_are_not_blocked() {
        let h = harness();
        h.users.create("u-2", "Luis").unwrap();
        let _lease = h.users.lock("u-1").await;
        let reply = h.router.handle_message("u-2", "hello").await.unwrap();
        assert_eq!(reply.reasoning, Reasoning::BookingDefault);
    }
}
