//! @acp:module "Locations"
//! @acp:summary "Classifies the syntactic context of an expression and filters allowed placements"
//! @acp:domain parser
//! @acp:layer core

use bitflags::bitflags;

use crate::ast::walk::Ancestor;

bitflags! {
    /// Where in a file an expression appears.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Location: u8 {
        const FILE = 1 << 0;
        const VARIABLE = 1 << 1;
        const FUNCTION = 1 << 2;
        /// A package `init()` function, not a closure inside it
        const INIT_FUNCTION = 1 << 3;
        const FUNC_CALL = 1 << 4;
    }
}

/// @acp:summary "Compute the location of a node from its ancestors, outermost first"
pub fn classify(stack: &[Ancestor<'_>]) -> Location {
    let mut loc = Location::empty();
    for anc in stack {
        match anc {
            Ancestor::File(_) => loc |= Location::FILE,
            Ancestor::VarDecl => loc |= Location::VARIABLE,
            Ancestor::FuncDecl(fd) => {
                let nested = loc.contains(Location::FUNCTION);
                loc |= Location::FUNCTION;
                if !nested && fd.name.name == "init" && fd.params.is_empty() && fd.recv.is_none()
                {
                    loc |= Location::INIT_FUNCTION;
                }
            }
            Ancestor::FuncLit => {
                loc |= Location::FUNCTION;
                loc.remove(Location::INIT_FUNCTION);
            }
            Ancestor::Call => loc |= Location::FUNC_CALL,
            Ancestor::ConstDecl | Ancestor::ValueSpec { .. } => {}
        }
    }
    loc
}

/// Requires every `allowed` bit and forbids every `disallowed` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    allowed: Location,
    disallowed: Location,
}

impl Filter {
    pub fn allowed_in(loc: Location) -> Self {
        Self {
            allowed: loc,
            disallowed: Location::empty(),
        }
    }

    pub fn but_not_in(mut self, loc: Location) -> Self {
        self.disallowed |= loc;
        self
    }

    pub fn allows(&self, loc: Location) -> bool {
        loc.contains(self.allowed) && !loc.intersects(self.disallowed)
    }
}

/// Alternatives; a location passes if any filter allows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(pub Vec<Filter>);

impl Filters {
    pub fn allows(&self, loc: Location) -> bool {
        self.0.iter().any(|f| f.allows(loc))
    }
}

impl From<Filter> for Filters {
    fn from(f: Filter) -> Self {
        Filters(vec![f])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::walk::{walk_file, Visitor};
    use crate::ast::Expr;
    use crate::loader::parse_go;

    /// Locations of every call to `target`, in source order.
    struct CallLocations<'t> {
        target: &'t str,
        found: Vec<Location>,
    }

    impl<'a> Visitor<'a> for CallLocations<'_> {
        fn visit_expr(&mut self, expr: &'a Expr, stack: &[Ancestor<'a>], callee: bool) {
            if callee && expr.as_selector().is_some_and(|(_, f)| f.name == self.target) {
                // The innermost ancestor is the call being made.
                self.found.push(classify(&stack[..stack.len() - 1]));
            }
        }
    }

    fn locations(src: &str) -> Vec<Location> {
        let file = parse_go("svc/svc.go", src).unwrap().file;
        let mut v = CallLocations {
            target: "NewTopic",
            found: Vec::new(),
        };
        walk_file(&file, &mut v);
        v.found
    }

    fn resource_filter() -> Filter {
        Filter::allowed_in(Location::VARIABLE).but_not_in(Location::FUNCTION | Location::FUNC_CALL)
    }

    #[test]
    fn test_package_level_var_is_allowed() {
        let locs = locations("package svc\n\nvar T = pubsub.NewTopic(\"t\", cfg)\n");
        assert_eq!(locs, vec![Location::FILE | Location::VARIABLE]);
        assert!(resource_filter().allows(locs[0]));
    }

    #[test]
    fn test_inside_function_is_disallowed() {
        let locs = locations(
            "package svc\n\nfunc f() {\n    var t = pubsub.NewTopic(\"t\", cfg)\n    _ = t\n}\n",
        );
        assert!(locs[0].contains(Location::FUNCTION | Location::VARIABLE));
        assert!(!resource_filter().allows(locs[0]));
    }

    #[test]
    fn test_nested_call_is_disallowed() {
        let locs = locations("package svc\n\nvar T = wrap(pubsub.NewTopic(\"t\", cfg))\n");
        assert!(locs[0].contains(Location::FUNC_CALL));
        assert!(!resource_filter().allows(locs[0]));
    }

    #[test]
    fn test_init_function() {
        let locs = locations(
            "package svc\n\nfunc init() {\n    pubsub.NewTopic(\"t\", cfg)\n    go func() { pubsub.NewTopic(\"u\", cfg) }()\n}\n",
        );
        assert_eq!(locs.len(), 2);
        assert!(locs[0].contains(Location::INIT_FUNCTION));
        assert!(!locs[1].contains(Location::INIT_FUNCTION));
        assert!(locs[1].contains(Location::FUNCTION));
    }

    #[test]
    fn test_filters_are_ored() {
        let filters = Filters(vec![
            resource_filter(),
            Filter::allowed_in(Location::INIT_FUNCTION).but_not_in(Location::FUNC_CALL),
        ]);
        assert!(filters.allows(Location::FILE | Location::VARIABLE));
        assert!(filters.allows(Location::FILE | Location::FUNCTION | Location::INIT_FUNCTION));
        assert!(!filters.allows(Location::FILE | Location::FUNCTION));
    }
}
