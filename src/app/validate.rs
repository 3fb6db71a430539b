//! @acp:module "Composition Checks"
//! @acp:summary "Application-wide rules that no single package can check on its own"
//! @acp:domain parser
//! @acp:layer service

use std::collections::HashMap;

use super::App;
use crate::apis::{AuthHandler, ServiceStruct};
use crate::ast::QualifiedName;
use crate::diag::{ErrorList, Position};
use crate::paths::PathSet;
use crate::resources::{Resource, ResourceKind};
use crate::schema::Receiver;

/// Keep the first auth handler, reporting any others.
pub fn single_auth_handler(errs: &ErrorList, handlers: Vec<AuthHandler>) -> Option<AuthHandler> {
    let mut handlers = handlers.into_iter();
    let first = handlers.next()?;
    for other in handlers {
        errs.add(
            &other.pos,
            format!(
                "multiple auth handlers defined (previous one at {})",
                first.pos
            ),
        );
    }
    Some(first)
}

/// @acp:summary "Run every composition check against a composed application"
pub fn compose(errs: &ErrorList, app: &App) {
    check_auth(errs, app);
    check_paths(errs, app);
    check_receivers(errs, app);
    check_cron_endpoints(errs, app);
    check_resource_names(errs, app);
}

fn check_auth(errs: &ErrorList, app: &App) {
    if app.auth_handler.is_some() {
        return;
    }
    for rpc in app.rpcs.iter().filter(|r| r.requires_auth()) {
        errs.add(
            &rpc.pos,
            format!(
                "endpoint {}.{} requires authentication but no auth handler is defined",
                rpc.pkg_path, rpc.name
            ),
        );
    }
}

fn check_paths(errs: &ErrorList, app: &App) {
    let mut set = PathSet::new();
    for rpc in &app.rpcs {
        for method in &rpc.methods {
            if let Err(e) = set.add(method, &rpc.path) {
                errs.add(&e.pos, e.message);
                break;
            }
        }
    }
}

/// Receivers of endpoints, auth handlers and middleware must be the service struct.
fn check_receivers(errs: &ErrorList, app: &App) {
    let services: HashMap<&str, &ServiceStruct> = app
        .service_structs
        .iter()
        .map(|s| (s.pkg_path.as_str(), s))
        .collect();

    let check = |what: &str, name: &str, pkg_path: &str, recv: &Option<Receiver>, pos: &Position| {
        let Some(recv) = recv else { return };
        let Some(named) = recv.ty.named() else { return };
        let matches = services
            .get(pkg_path)
            .is_some_and(|s| named.name.is(&s.pkg_path, &s.name));
        if !matches {
            errs.add(
                pos,
                format!(
                    "{} {} is defined on {}, which is not the service struct of package {}",
                    what, name, named.name, pkg_path
                ),
            );
        }
    };

    for rpc in &app.rpcs {
        check("endpoint", &rpc.name, &rpc.pkg_path, &rpc.recv, &rpc.pos);
    }
    if let Some(ah) = &app.auth_handler {
        check("auth handler", &ah.name, &ah.pkg_path, &ah.recv, &ah.pos);
    }
    for mw in &app.middleware {
        check("middleware", &mw.name, &mw.pkg_path, &mw.recv, &mw.pos);
    }
}

fn check_cron_endpoints(errs: &ErrorList, app: &App) {
    for resource in &app.resources {
        let Resource::CronJob(job) = resource else {
            continue;
        };
        let found = app
            .rpcs
            .iter()
            .any(|r| job.endpoint.is(&r.pkg_path, &r.name));
        if !found {
            errs.add(
                &job.site.pos,
                format!(
                    "cron job {} endpoint {} is not an API endpoint",
                    job.name, job.endpoint
                ),
            );
        }
    }
}

/// Names are unique per kind; subscription names are unique per topic.
fn check_resource_names(errs: &ErrorList, app: &App) {
    let mut seen: HashMap<(ResourceKind, Option<&QualifiedName>, &str), &Position> =
        HashMap::new();
    for resource in &app.resources {
        let Some(name) = resource.name() else { continue };
        let scope = match resource {
            Resource::PubSubSubscription(s) => Some(&s.topic_ref),
            _ => None,
        };
        let pos = &resource.site().pos;
        if let Some(prev) = seen.insert((resource.kind(), scope, name), pos) {
            let what = match scope {
                Some(topic) => format!("subscription name {:?} for topic {}", name, topic),
                None => format!("{} name {:?}", resource.kind(), name),
            };
            errs.add(
                pos,
                format!("duplicate {} (previously declared at {})", what, prev),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_app;

    #[test]
    fn test_multiple_auth_handlers() {
        let handler = |pkg: &str| {
            format!(
                "package {}\n\nimport (\n    \"context\"\n    \"encore.dev/beta/auth\"\n)\n\n//encore:authhandler\nfunc Auth(ctx context.Context, token string) (auth.UID, error) {{ return \"\", nil }}\n",
                pkg
            )
        };
        let (a, b) = (handler("a"), handler("b"));
        let (app, msgs) = parse_app(&[("a/a.go", a.as_str()), ("b/b.go", b.as_str())]);
        assert_eq!(app.auth_handler.unwrap().pkg_path, "app/a");
        assert_eq!(
            msgs,
            vec!["multiple auth handlers defined (previous one at a/a.go:9:6)"]
        );
    }

    #[test]
    fn test_auth_endpoint_needs_handler() {
        let (_, msgs) = parse_app(&[(
            "svc/svc.go",
            "package svc\n\nimport \"context\"\n\n//encore:api auth\nfunc Me(ctx context.Context) error { return nil }\n",
        )]);
        assert_eq!(
            msgs,
            vec!["endpoint app/svc.Me requires authentication but no auth handler is defined"]
        );
    }

    #[test]
    fn test_path_conflicts_across_packages() {
        let (_, msgs) = parse_app(&[
            (
                "a/a.go",
                "package a\n\nimport \"context\"\n\n//encore:api public method=GET path=/user/:id\nfunc Get(ctx context.Context, id string) error { return nil }\n",
            ),
            (
                "b/b.go",
                "package b\n\nimport \"context\"\n\n//encore:api public method=GET path=/user/me\nfunc Me(ctx context.Context) error { return nil }\n",
            ),
        ]);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("/user/me"), "{}", msgs[0]);
    }

    #[test]
    fn test_receiver_must_be_service_struct() {
        let (_, msgs) = parse_app(&[(
            "svc/svc.go",
            "package svc\n\nimport \"context\"\n\n//encore:service\ntype Service struct{}\n\ntype Other struct{}\n\n//encore:api public\nfunc (s *Service) A(ctx context.Context) error { return nil }\n\n//encore:api public\nfunc (o *Other) B(ctx context.Context) error { return nil }\n",
        )]);
        assert_eq!(
            msgs,
            vec!["endpoint B is defined on app/svc.Other, which is not the service struct of package app/svc"]
        );
    }

    #[test]
    fn test_cron_endpoint_must_be_an_api() {
        let (_, msgs) = parse_app(&[(
            "svc/svc.go",
            "package svc\n\nimport (\n    \"context\"\n    \"encore.dev/cron\"\n)\n\nvar _ = cron.NewJob(\"good\", cron.JobConfig{Endpoint: Tick, Every: cron.Hour})\nvar _ = cron.NewJob(\"bad\", cron.JobConfig{Endpoint: helper, Every: cron.Hour})\n\n//encore:api private\nfunc Tick(ctx context.Context) error { return nil }\n\nfunc helper() {}\n",
        )]);
        assert_eq!(
            msgs,
            vec!["cron job bad endpoint app/svc.helper is not an API endpoint"]
        );
    }

    #[test]
    fn test_duplicate_resource_names() {
        let (_, msgs) = parse_app(&[
            (
                "a/a.go",
                "package a\n\nimport \"encore.dev/storage/sqldb\"\n\nvar db = sqldb.Named(\"main\")\n",
            ),
            (
                "b/b.go",
                "package b\n\nimport (\n    \"encore.dev/pubsub\"\n    \"encore.dev/storage/sqldb\"\n)\n\ntype E struct{}\n\nvar db = sqldb.Named(\"main\")\nvar T1 = pubsub.NewTopic[*E](\"t1\", pubsub.TopicConfig{DeliveryGuarantee: 1})\nvar T2 = pubsub.NewTopic[*E](\"t2\", pubsub.TopicConfig{DeliveryGuarantee: 1})\nvar _ = pubsub.NewSubscription(T1, \"s\", pubsub.SubscriptionConfig[*E]{Handler: h})\nvar _ = pubsub.NewSubscription(T2, \"s\", pubsub.SubscriptionConfig[*E]{Handler: h})\nvar _ = pubsub.NewSubscription(T2, \"s\", pubsub.SubscriptionConfig[*E]{Handler: h})\n",
            ),
        ]);
        assert_eq!(
            msgs,
            vec![
                "duplicate sql database name \"main\" (previously declared at a/a.go:5:10)",
                "duplicate subscription name \"s\" for topic app/b.T2 (previously declared at b/b.go:14:9)",
            ]
        );
    }
}
