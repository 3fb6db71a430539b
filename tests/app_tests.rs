//! Application parsing integration tests
//!
//! Builds small Encore applications on disk and parses them end to end.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use encore_parser::{AppParser, Config, PackageStatus, ResourceKind, Workspace};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

const USERS: &str = r#"package users

import (
	"context"

	"encore.dev/beta/auth"
	"encore.dev/pubsub"
	"encore.dev/storage/cache"
	"encore.dev/storage/sqldb"
)

//encore:service
type Service struct{}

func initService() (*Service, error) { return &Service{}, nil }

type SignupEvent struct {
	UserID string
}

// Signups is published whenever a user signs up.
var Signups = pubsub.NewTopic[*SignupEvent]("signups", pubsub.TopicConfig{
	DeliveryGuarantee: pubsub.AtLeastOnce,
	OrderingKey:       "UserID",
})

var Sessions = cache.NewCluster("sessions", cache.ClusterConfig{
	EvictionPolicy: cache.AllKeysLRU,
})

var SessionData = cache.NewStringKeyspace[string](Sessions, cache.KeyspaceConfig{
	KeyPattern: "session/:id",
})

var db = sqldb.Named("users")

type GetParams struct {
	Verbose bool
}

type User struct {
	ID   int
	Name string
}

// Get returns a user by ID.
//encore:api auth method=GET path=/users/:id
func (s *Service) Get(ctx context.Context, id int, p *GetParams) (*User, error) {
	return nil, nil
}

//encore:authhandler
func (s *Service) Authenticate(ctx context.Context, token string) (auth.UID, error) {
	return "", nil
}
"#;

const MAILER: &str = r#"package mailer

import (
	"context"

	"encore.app/users"
	"encore.dev/cron"
	"encore.dev/middleware"
	"encore.dev/pubsub"
)

var _ = pubsub.NewSubscription(users.Signups, "send-welcome", pubsub.SubscriptionConfig[*users.SignupEvent]{
	Handler: SendWelcome,
})

func SendWelcome(ctx context.Context, e *users.SignupEvent) error { return nil }

var _ = cron.NewJob("digest", cron.JobConfig{
	Title:    "Daily digest",
	Endpoint: Digest,
	Every:    24 * cron.Hour,
})

//encore:api private
func Digest(ctx context.Context) error { return nil }

//encore:middleware global target=all
func Trace(req middleware.Request, next middleware.Next) middleware.Response {
	return next(req)
}
"#;

fn app_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "go.mod", "module encore.app\n\ngo 1.22\n");
    write(dir.path(), "users/users.go", USERS);
    write(dir.path(), "mailer/mailer.go", MAILER);
    dir
}

// =============================================================================
// End-to-end parsing
// =============================================================================

mod end_to_end {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_application_from_disk() {
        let dir = app_dir();
        let ws = Workspace::from_dir(dir.path(), &Config::default()).unwrap();
        assert!(ws.diagnostics().is_empty(), "{:?}", ws.diagnostics());

        let result = AppParser::new(Arc::new(ws)).parse().unwrap();
        let msgs: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();
        assert!(msgs.is_empty(), "{:#?}", msgs);

        let app = result.app;
        assert_eq!(app.module_path, "encore.app");
        let packages: Vec<(&str, PackageStatus)> = app
            .packages
            .iter()
            .map(|p| (p.import_path.as_str(), p.status))
            .collect();
        assert_eq!(
            packages,
            vec![
                ("encore.app/mailer", PackageStatus::Parsed),
                ("encore.app/users", PackageStatus::Parsed),
            ]
        );

        let get = app.rpcs.iter().find(|r| r.name == "Get").unwrap();
        assert_eq!(get.path.to_string(), "/users/:id");
        assert_eq!(get.doc, "Get returns a user by ID.");
        assert!(get.request.is_some());
        assert!(get.response.is_some());

        assert_eq!(
            app.auth_handler.as_ref().map(|a| a.name.as_str()),
            Some("Authenticate")
        );
        assert_eq!(app.middleware.len(), 1);
        assert!(app.service_structs[0].init.is_some());

        let mut kinds: Vec<ResourceKind> = app.resources.iter().map(|r| r.kind()).collect();
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::PubSubTopic,
                ResourceKind::PubSubSubscription,
                ResourceKind::CacheCluster,
                ResourceKind::CacheKeyspace,
                ResourceKind::CronJob,
                ResourceKind::SqlDatabase,
            ]
        );
    }

    #[test]
    fn test_model_serializes_with_resource_kinds() {
        let dir = app_dir();
        let ws = Workspace::from_dir(dir.path(), &Config::default()).unwrap();
        let result = AppParser::new(Arc::new(ws)).parse().unwrap();

        let json = serde_json::to_value(&result.app).unwrap();
        let topic = json["resources"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["kind"] == "pub_sub_topic")
            .unwrap();
        assert_eq!(topic["name"], "signups");
        assert_eq!(topic["binding"], "Signups");
        assert_eq!(topic["delivery_guarantee"], "at_least_once");

        let yaml = serde_yaml::to_string(&result.app).unwrap();
        assert!(yaml.contains("module_path: encore.app"));
    }
}

// =============================================================================
// Loading
// =============================================================================

mod loading {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_excludes_and_module_override() {
        let dir = app_dir();
        write(
            dir.path(),
            "legacy/legacy.go",
            "package legacy\n\nimport \"encore.dev/storage/sqldb\"\n\nvar db = sqldb.Named(\"users\")\n",
        );

        let config: Config = serde_json::from_str(
            r#"{"modulePath": "example.com/app", "exclude": ["legacy/**"]}"#,
        )
        .unwrap();
        let ws = Workspace::from_dir(dir.path(), &config).unwrap();
        let result = AppParser::new(Arc::new(ws)).parse().unwrap();

        assert_eq!(result.app.module_path, "example.com/app");
        assert!(result
            .app
            .packages
            .iter()
            .all(|p| !p.import_path.ends_with("legacy")));
    }

    #[test]
    fn test_missing_go_mod_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "svc/svc.go", "package svc\n");
        assert!(Workspace::from_dir(dir.path(), &Config::default()).is_err());
    }

    #[test]
    fn test_syntax_errors_do_not_stop_the_run() {
        let dir = app_dir();
        write(dir.path(), "broken/broken.go", "package broken\n\nfunc {\n");
        let ws = Workspace::from_dir(dir.path(), &Config::default()).unwrap();
        assert!(ws
            .diagnostics()
            .iter()
            .any(|d| d.message == "syntax error"));

        let result = AppParser::new(Arc::new(ws)).parse().unwrap();
        assert!(result.app.rpcs.iter().any(|r| r.name == "Digest"));
    }
}
