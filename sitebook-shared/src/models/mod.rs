/// Database models for SiteBook
///
/// Every tenant-scoped query takes the caller's `org_id` and filters on it;
/// a row from another organization behaves exactly like a missing row.
///
/// # Models
///
/// - `user`: User accounts
/// - `organization`: Tenants
/// - `membership`: User-organization relationships with roles
/// - `project`, `task`: Projects and their kanban board
/// - `time_entry`, `payroll_config`: Hours worked and overtime settings
/// - `tax_rate`, `invoice`: Billing
/// - `subcontractor`, `bid`: Trade partners and their bids
/// - `rfi`: Requests for information
/// - `maintenance`: Equipment and site maintenance records
/// - `message`, `message_template`: Threads, messages and reusable templates
/// - `activity`: Organization activity log
///
/// # Example
///
/// ```no_run
/// use sitebook_shared::models::project::{CreateProject, Project};
/// use sitebook_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let projects = Project::list(&pool, org_id, None, 50, 0).await?;
/// println!("{} projects", projects.len());
/// # Ok(())
/// # }
/// ```

pub mod activity;
pub mod bid;
pub mod invoice;
pub mod maintenance;
pub mod membership;
pub mod message;
pub mod message_template;
pub mod organization;
pub mod payroll_config;
pub mod project;
pub mod rfi;
pub mod subcontractor;
pub mod task;
pub mod tax_rate;
pub mod time_entry;
pub mod user;
