use async_graphql::{Context, Object, Result, SimpleObject};

use crate::database::Database;

pub(crate) const SERVICE_NAME: &str = "String Analyzer API";

#[derive(SimpleObject)]
struct Health {
    status: String,
    total_analyses: usize,
    service: String,
    version: String,
}

#[derive(Default)]
pub(super) struct HealthQuery;

#[Object]
impl HealthQuery {
    #[allow(clippy::unused_async)]
    async fn health(&self, ctx: &Context<'_>) -> Result<Health> {
        let db = ctx.data::<Database>()?;
        Ok(Health {
            status: "healthy".to_string(),
            total_analyses: db.count(),
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::api::TestSchema;

    #[tokio::test]
    async fn health() {
        let schema = TestSchema::new();
        schema.db.insert("hello").unwrap();
        let query = r"{ health { status totalAnalyses service version } }";
        let res = schema.execute(query).await;
        assert_eq!(
            res.data.to_string(),
            format!(
                "{{health: {{status: \"healthy\", totalAnalyses: 1, \
                service: \"String Analyzer API\", version: \"{}\"}}}}",
                env!("CARGO_PKG_VERSION")
            )
        );
    }
}
