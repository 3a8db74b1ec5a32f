//! MQ broker user
//!
//! Identified by `broker-id/username`. The password is write-only: the
//! broker accepts it on create and update but never returns it.

use lifecycle::{
    Attributes, ChangeSet, ClassifiedError, ErrorKind, FieldSpec, ImportFormat, Record,
    RemoteClient, Resource, ResourceId, Schema, TranslateError, Value,
};
use lifecycle::identifier::DELIMITER;
use mqkit::{CreateUserInput, DescribeUserOutput, ErrorCategory, UpdateUserInput};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Minimum password length accepted by the broker
pub const MIN_PASSWORD_LEN: usize = 12;

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.~-]{2,100}$").expect("username regex is valid")
});

static USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("broker_id").immutable(),
    FieldSpec::new("username").immutable(),
    FieldSpec::new("password").sensitive().write_only(),
    FieldSpec::new("console_access").remote_default(),
    FieldSpec::new("groups").remote_default(),
    FieldSpec::new("replication_user").remote_default(),
    FieldSpec::new("id").computed(),
];

/// Field table for `mq_user`
pub static USER_SCHEMA: Schema = Schema {
    type_name: "mq_user",
    display_name: "MQ User",
    fields: USER_FIELDS,
    import_format: ImportFormat::new(&["broker-id", "username"]),
};

/// Desired state of a broker user
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub broker_id: String,
    pub username: String,
    pub password: String,
    /// `None` leaves the broker's default
    pub console_access: Option<bool>,
    /// `None` leaves the broker's default; `Some(vec![])` means no groups
    pub groups: Option<Vec<String>>,
    pub replication_user: Option<bool>,
}

impl User {
    pub fn new(
        broker_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            broker_id: broker_id.into(),
            username: username.into(),
            password: password.into(),
            console_access: None,
            groups: None,
            replication_user: None,
        }
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new([self.broker_id.as_str(), self.username.as_str()])
    }

    fn validate(&self) -> Result<(), TranslateError> {
        if self.broker_id.is_empty() {
            return Err(TranslateError::invalid("broker_id", "must not be empty"));
        }
        if self.broker_id.contains(DELIMITER) {
            return Err(TranslateError::invalid(
                "broker_id",
                format!("must not contain '{DELIMITER}'"),
            ));
        }
        if !USERNAME_REGEX.is_match(&self.username) {
            return Err(TranslateError::invalid(
                "username",
                "must be 2-100 characters: letters, digits, and _ . ~ -",
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TranslateError::invalid(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("broker_id", &self.broker_id)
            .field("username", &self.username)
            .field("password", &"(sensitive)")
            .field("console_access", &self.console_access)
            .field("groups", &self.groups)
            .field("replication_user", &self.replication_user)
            .finish()
    }
}

impl Record for User {
    fn attributes(&self) -> Attributes {
        Attributes::new()
            .with("broker_id", self.broker_id.as_str())
            .with("username", self.username.as_str())
            .with("password", self.password.as_str())
            .with("console_access", self.console_access)
            .with("groups", self.groups.clone().map(Value::string_list))
            .with("replication_user", self.replication_user)
    }
}

/// Map a broker API error onto the lifecycle taxonomy
pub fn classify(err: mqkit::Error) -> ClassifiedError {
    let kind = match err.category() {
        ErrorCategory::NotFound => ErrorKind::NotFound,
        ErrorCategory::Throttled | ErrorCategory::Unavailable => ErrorKind::Transient,
        ErrorCategory::Conflict => ErrorKind::Conflict,
        ErrorCategory::BadRequest | ErrorCategory::Forbidden | ErrorCategory::Other => {
            ErrorKind::Permanent
        }
    };
    ClassifiedError::new(kind, err)
}

/// Broker user calls over an [`mqkit::Client`]
#[derive(Debug, Clone)]
pub struct UserClient {
    api: mqkit::Client,
}

impl UserClient {
    pub fn new(api: mqkit::Client) -> Self {
        Self { api }
    }
}

/// Split an identifier into broker ID and username
fn split_id(id: &ResourceId) -> Result<(&str, &str), ClassifiedError> {
    let broker_id = id.part(0).unwrap_or_default();
    let username = id.part(1).unwrap_or_default();
    if broker_id.is_empty() {
        return Err(ClassifiedError::not_found(
            "cannot find MQ User with an empty broker ID",
        ));
    }
    if username.is_empty() {
        return Err(ClassifiedError::not_found(
            "cannot find MQ User with an empty username",
        ));
    }
    Ok((broker_id, username))
}

impl RemoteClient for UserClient {
    type Request = CreateUserInput;
    type Created = ();
    type Response = DescribeUserOutput;
    type Patch = UpdateUserInput;

    fn create(&self, request: &CreateUserInput) -> Result<(), ClassifiedError> {
        self.api.create_user(request).map_err(classify)
    }

    fn read(&self, id: &ResourceId) -> Result<DescribeUserOutput, ClassifiedError> {
        let (broker_id, username) = split_id(id)?;
        self.api.describe_user(broker_id, username).map_err(classify)
    }

    fn update(&self, _id: &ResourceId, patch: &UpdateUserInput) -> Result<(), ClassifiedError> {
        self.api.update_user(patch).map_err(classify)
    }

    fn delete(&self, id: &ResourceId) -> Result<(), ClassifiedError> {
        let (broker_id, username) = split_id(id)?;
        self.api.delete_user(broker_id, username).map_err(classify)
    }

    fn list(&self, broker_id: &str) -> Result<Vec<ResourceId>, ClassifiedError> {
        let users = self.api.list_users(broker_id).map_err(classify)?;
        users
            .into_iter()
            .map(|u| {
                ResourceId::try_new([broker_id.to_string(), u.username])
                    .map_err(ClassifiedError::permanent)
            })
            .collect()
    }
}

/// The `mq_user` resource kind
#[derive(Debug, Clone, Copy, Default)]
pub struct UserResource;

impl Resource for UserResource {
    type Desired = User;
    type Client = UserClient;

    fn schema(&self) -> &'static Schema {
        &USER_SCHEMA
    }

    fn label(&self, desired: &User) -> String {
        desired.id().to_string()
    }

    fn to_request(&self, desired: &User) -> Result<CreateUserInput, TranslateError> {
        desired.validate()?;
        Ok(CreateUserInput {
            broker_id: desired.broker_id.clone(),
            username: desired.username.clone(),
            password: desired.password.clone(),
            console_access: desired.console_access,
            groups: desired.groups.clone(),
            replication_user: desired.replication_user,
        })
    }

    fn to_observed(&self, output: &DescribeUserOutput) -> Result<Attributes, TranslateError> {
        if output.username.is_empty() {
            return Err(TranslateError::MissingAttribute("username".to_string()));
        }
        Ok(Attributes::new()
            .with("broker_id", output.broker_id.as_str())
            .with("username", output.username.as_str())
            .with("id", output.username.as_str())
            .with("console_access", output.console_access)
            .with(
                "groups",
                Value::string_list(output.groups.iter().map(String::as_str)),
            )
            .with("replication_user", output.replication_user))
    }

    fn to_patch(
        &self,
        id: &ResourceId,
        desired: &User,
        changes: &ChangeSet,
    ) -> Result<UpdateUserInput, TranslateError> {
        let mut patch = UpdateUserInput::new(
            id.part(0).unwrap_or_default(),
            id.part(1).unwrap_or_default(),
        );
        if changes.updates("password") {
            desired.validate()?;
            patch.password = Some(desired.password.clone());
        }
        if changes.updates("console_access") {
            patch.console_access = desired.console_access;
        }
        if changes.updates("groups") {
            patch.groups = desired.groups.clone();
        }
        if changes.updates("replication_user") {
            patch.replication_user = desired.replication_user;
        }
        Ok(patch)
    }

    fn identifier(&self, desired: &User, _created: &()) -> Result<ResourceId, TranslateError> {
        ResourceId::try_new([desired.broker_id.as_str(), desired.username.as_str()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle::{
        CollectDiagnostics, DeleteOutcome, Error, MemoryStore, Phase, ReadOutcome,
        ReconcileConfig, Reconciler, RetryPolicy, StabilizeConfig, StateStore, UpdateOutcome,
        diff,
    };
    use mqkit::backend::MqApi;
    use mqkit::backend::memory::{MemoryBroker, Operation};
    use std::sync::Arc;
    use std::time::Duration;

    const PASSWORD: &str = "correct-horse-battery";

    fn fast_config() -> ReconcileConfig {
        ReconcileConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                backoff_factor: 1.0,
                max_delay: Duration::from_millis(2),
                jitter: 0.0,
                max_elapsed: None,
            },
            stabilize: StabilizeConfig {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(1),
                backoff_factor: 1.0,
                max_poll_interval: Duration::from_millis(2),
            },
        }
    }

    struct Fixture {
        broker: MemoryBroker,
        client: UserClient,
        store: MemoryStore,
        diagnostics: CollectDiagnostics,
    }

    impl Fixture {
        fn new(broker: MemoryBroker) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            broker.add_broker("b-1234");
            let client = UserClient::new(mqkit::Client::with_backend(Arc::new(broker.clone())));
            Self {
                broker,
                client,
                store: MemoryStore::new(),
                diagnostics: CollectDiagnostics::new(),
            }
        }

        fn reconciler(&self) -> Reconciler<'_, UserResource> {
            Reconciler::new(&UserResource, &self.client, &self.store, &self.diagnostics)
                .with_config(fast_config())
        }
    }

    fn alice() -> User {
        User {
            groups: Some(vec!["admins".into(), "ops".into()]),
            ..User::new("b-1234", "alice", PASSWORD)
        }
    }

    #[test]
    fn test_validation() {
        let nested = User::new("team/b-1234", "alice", PASSWORD);
        assert!(matches!(
            UserResource.to_request(&nested),
            Err(TranslateError::Invalid { ref name, .. }) if name == "broker_id"
        ));

        let short = User::new("b-1234", "alice", "short");
        assert!(matches!(
            UserResource.to_request(&short),
            Err(TranslateError::Invalid { ref name, .. }) if name == "password"
        ));

        let long = "x".repeat(101);
        for bad in ["a", "has space", "slash/name", long.as_str()] {
            let user = User::new("b-1234", bad, PASSWORD);
            assert!(UserResource.to_request(&user).is_err(), "{bad}");
        }
        for good in ["ab", "alice.smith", "svc_user-1~x"] {
            let user = User::new("b-1234", good, PASSWORD);
            assert!(UserResource.to_request(&user).is_ok(), "{good}");
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        assert!(!format!("{:?}", alice()).contains(PASSWORD));
    }

    #[test]
    fn test_classify() {
        use mqkit::Error as ApiError;
        assert_eq!(classify(ApiError::from_status(404, "gone")).kind(), ErrorKind::NotFound);
        assert_eq!(classify(ApiError::from_status(429, "slow")).kind(), ErrorKind::Transient);
        assert_eq!(classify(ApiError::from_status(500, "oops")).kind(), ErrorKind::Transient);
        assert_eq!(classify(ApiError::from_status(409, "busy")).kind(), ErrorKind::Conflict);
        assert_eq!(classify(ApiError::from_status(400, "bad")).kind(), ErrorKind::Permanent);
        assert_eq!(classify(ApiError::from_status(403, "no")).kind(), ErrorKind::Permanent);

        let err = classify(ApiError::from_status(403, "denied"));
        assert_eq!(err.provider_error().to_string(), "forbidden: denied");
    }

    #[test]
    fn test_round_trip() {
        let fx = Fixture::new(MemoryBroker::new());
        let user = User {
            console_access: Some(true),
            replication_user: Some(false),
            ..alice()
        };

        let state = fx.reconciler().create(&user).unwrap();

        let desired = user.attributes();
        assert_eq!(state.attributes.restrict(desired.names()), desired);
        assert_eq!(state.attributes.get("id").as_str(), Some("alice"));
        assert!(diff(&USER_SCHEMA, &desired, &state.attributes).is_empty());
    }

    #[test]
    fn test_create_waits_for_visibility() {
        let fx = Fixture::new(MemoryBroker::new().with_visibility_delay(3));

        let state = fx.reconciler().create(&alice()).unwrap();

        assert_eq!(state.id.to_string(), "b-1234/alice");
        assert_eq!(fx.broker.calls(Operation::DescribeUser), 4);
        let record = fx.store.get("mq_user", &state.id).unwrap().unwrap();
        assert_eq!(record.phase, Phase::Present);
    }

    #[test]
    fn test_create_short_password_never_reaches_broker() {
        let fx = Fixture::new(MemoryBroker::new());

        let err = fx
            .reconciler()
            .create(&User::new("b-1234", "alice", "too-short"))
            .unwrap_err();

        assert!(matches!(err, Error::Translate(_)));
        assert_eq!(fx.broker.total_calls(), 0);
    }

    #[test]
    fn test_create_retries_throttling() {
        let fx = Fixture::new(MemoryBroker::new());
        fx.broker
            .fail_next(Operation::CreateUser, mqkit::Error::from_status(429, "slow down"));

        fx.reconciler().create(&alice()).unwrap();
        assert_eq!(fx.broker.calls(Operation::CreateUser), 2);
    }

    #[test]
    fn test_update_sends_partial_document() {
        let fx = Fixture::new(MemoryBroker::new());
        let id = fx.reconciler().create(&alice()).unwrap().id;

        let changed = User {
            console_access: Some(true),
            ..alice()
        };
        let outcome = fx.reconciler().update(&id, &changed).unwrap();

        assert!(matches!(outcome, UpdateOutcome::Updated(_)));
        // Password untouched on the broker side
        assert_eq!(fx.broker.password("b-1234", "alice").as_deref(), Some(PASSWORD));

        let calls = fx.broker.total_calls();
        let again = fx.reconciler().update(&id, &changed).unwrap();
        assert!(matches!(again, UpdateOutcome::Unchanged(_)));
        assert_eq!(fx.broker.total_calls(), calls);
    }

    #[test]
    fn test_to_patch_only_changed_fields() {
        let mut observed = UserResource
            .to_observed(&DescribeUserOutput {
                broker_id: "b-1234".into(),
                username: "alice".into(),
                console_access: Some(false),
                groups: vec!["admins".into(), "ops".into()],
                replication_user: Some(false),
            })
            .unwrap();
        observed.set("password", PASSWORD);

        let desired = User {
            groups: Some(vec![]),
            ..alice()
        };
        let changes = diff(&USER_SCHEMA, &desired.attributes(), &observed);
        let patch = UserResource.to_patch(&desired.id(), &desired, &changes).unwrap();

        assert_eq!(patch.broker_id, "b-1234");
        assert_eq!(patch.username, "alice");
        assert_eq!(patch.groups, Some(vec![]));
        assert_eq!(patch.password, None);
        assert_eq!(patch.console_access, None);
    }

    #[test]
    fn test_password_rotation() {
        let fx = Fixture::new(MemoryBroker::new());
        let id = fx.reconciler().create(&alice()).unwrap().id;

        let rotated = User {
            password: "a-much-longer-password".into(),
            ..alice()
        };
        fx.reconciler().update(&id, &rotated).unwrap();

        assert_eq!(
            fx.broker.password("b-1234", "alice").as_deref(),
            Some("a-much-longer-password")
        );
    }

    #[test]
    fn test_groups_drift_detected() {
        let fx = Fixture::new(MemoryBroker::new());
        let user = alice();
        let id = fx.reconciler().create(&user).unwrap().id;
        fx.broker.set_groups("b-1234", "alice", vec!["ops".into(), "admins".into()]);

        match fx.reconciler().drift(&id, &user).unwrap() {
            lifecycle::Drift::Changed(changes) => {
                assert_eq!(changes.updatable_names(), vec!["groups"]);
            }
            other => panic!("expected Changed, got {other:?}"),
        }
    }

    #[test]
    fn test_import_and_read_back() {
        let fx = Fixture::new(MemoryBroker::new());
        fx.broker
            .create_user(&CreateUserInput::new("b-1234", "bob", PASSWORD))
            .unwrap();

        let state = fx.reconciler().import("b-1234/bob").unwrap();
        assert_eq!(state.attributes.get("username").as_str(), Some("bob"));
        assert!(!state.attributes.contains("password"));

        let err = fx.reconciler().import("b-1234").unwrap_err();
        assert_eq!(
            err.to_string(),
            "wrong format of import ID (b-1234), use: broker-id/username"
        );
    }

    #[test]
    fn test_delete_twice() {
        let fx = Fixture::new(MemoryBroker::new());
        let id = fx.reconciler().create(&alice()).unwrap().id;

        assert_eq!(fx.reconciler().delete(&id).unwrap(), DeleteOutcome::Deleted);
        assert_eq!(fx.reconciler().delete(&id).unwrap(), DeleteOutcome::AlreadyAbsent);
        assert_eq!(fx.reconciler().read(&id).unwrap(), ReadOutcome::Gone);
    }

    #[test]
    fn test_unknown_broker_is_not_found() {
        let fx = Fixture::new(MemoryBroker::new());
        let id = ResourceId::new(["b-missing", "alice"]);
        assert_eq!(fx.reconciler().read(&id).unwrap(), ReadOutcome::Gone);
    }

    #[test]
    fn test_discover_untracked_users() {
        let fx = Fixture::new(MemoryBroker::new());
        fx.reconciler().create(&alice()).unwrap();
        fx.broker
            .create_user(&CreateUserInput::new("b-1234", "bob", PASSWORD))
            .unwrap();

        let found = fx.reconciler().discover("b-1234").unwrap();
        assert_eq!(found, vec![ResourceId::new(["b-1234", "bob"])]);
    }
}
