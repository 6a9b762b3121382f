use crate::jobs::error_codes::FailureKind;
use crate::jobs::model::TriggerEdge;
use crate::transfer::connect::close_quietly;
use crate::transfer::runner::JobRunner;
use crate::transfer::sql;

impl JobRunner {
    /// True when every trigger edge of `job_id` holds, running dependency jobs
    /// on demand. A job with no edges is satisfied without touching any database
    /// other than the metadata store.
    pub async fn satisfy(&self, job_id: i64) -> anyhow::Result<bool> {
        self.satisfy_chain(job_id, &[job_id]).await
    }

    /// `chain` is the path of jobs being resolved, ending with `job_id`.
    pub(super) async fn satisfy_chain(&self, job_id: i64, chain: &[i64]) -> anyhow::Result<bool> {
        let edges = self.jobs.list_triggers(job_id).await?;
        if edges.is_empty() {
            return Ok(true);
        }

        for edge in &edges {
            if self.edge_holds(edge).await? {
                continue;
            }

            if chain.contains(&edge.dependent_job_id) {
                let path = chain
                    .iter()
                    .chain(std::iter::once(&edge.dependent_job_id))
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                tracing::warn!(job_id, %path, "trigger cycle detected");
                self.logs
                    .append(job_id, &format!("trigger cycle detected: {path}"))
                    .await?;
                return Ok(false);
            }

            tracing::info!(
                job_id,
                dependency = edge.dependent_job_id,
                table = %edge.check_table,
                "trigger value missing, running dependency first"
            );
            self.run_chain(edge.dependent_job_id, chain).await?;

            if !self.edge_holds(edge).await? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn edge_holds(&self, edge: &TriggerEdge) -> anyhow::Result<bool> {
        self.value_present(
            edge.dependent_job_id,
            &edge.check_table,
            &edge.check_column,
            &edge.check_value,
        )
        .await
    }

    /// Does `table.column = value` match a row in the dependency's target database?
    /// Metadata errors propagate; errors against the target follow the policy.
    pub async fn value_present(
        &self,
        dependency_id: i64,
        table: &str,
        column: &str,
        value: &str,
    ) -> anyhow::Result<bool> {
        let Some(dependency) = self.jobs.get_job(dependency_id).await? else {
            return Ok(false);
        };

        let on_error = self.cfg.trigger_on_error;

        let mut conn = match self.resolver.open(&dependency.target).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    dependency_id,
                    error = %format!("{e:#}"),
                    "{}",
                    FailureKind::TriggerCheck.describe("cannot reach dependency target")
                );
                return Ok(on_error.resolve());
            }
        };

        let stmt = sql::value_exists(table, column);
        let found = match sqlx::query_scalar::<_, bool>(&stmt)
            .bind(value)
            .fetch_one(&mut conn)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    dependency_id,
                    table,
                    column,
                    error = %e,
                    "{}",
                    FailureKind::TriggerCheck.describe("trigger predicate failed")
                );
                on_error.resolve()
            }
        };

        close_quietly(conn).await;
        Ok(found)
    }
}
