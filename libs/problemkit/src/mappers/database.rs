//! Database faults through a [`DbErrorClassifier`]

use std::sync::Arc;

use super::problem_from_code;
use super::unexpected::map_unexpected;
use crate::classify::DbErrorClassifier;
use crate::context::RequestContext;
use crate::fault::Fault;
use crate::mapper::{Mapped, ProblemMapper};
use crate::sanitize::Sanitizer;

const DATABASE_DETAIL: &str = "A database error occurred.";

pub struct DatabaseMapper {
    sanitizer: Arc<Sanitizer>,
    classifier: Arc<dyn DbErrorClassifier>,
}

impl DatabaseMapper {
    #[must_use]
    pub fn new(sanitizer: Arc<Sanitizer>, classifier: Arc<dyn DbErrorClassifier>) -> Self {
        Self {
            sanitizer,
            classifier,
        }
    }
}

impl ProblemMapper for DatabaseMapper {
    fn name(&self) -> &'static str {
        "database"
    }

    fn can_handle(&self, fault: &Fault) -> bool {
        matches!(fault, Fault::Database(_))
    }

    fn map(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        let Fault::Database(err) = fault else {
            return map_unexpected(ctx, &self.sanitizer, fault, self.name());
        };
        let class = self.classifier.classify(err.number);
        let sanitization = self
            .sanitizer
            .sanitize(ctx, fault, Some(DATABASE_DETAIL), false);

        let mut builder = problem_from_code(ctx, &class.code, class.status, &sanitization.detail)
            .with_extension("sqlErrorNumber", err.number);
        if class.transient {
            builder = builder.with_extension("transient", true);
        }

        Mapped {
            status: class.status,
            problem: builder.build(),
            sanitization,
        }
    }
}
