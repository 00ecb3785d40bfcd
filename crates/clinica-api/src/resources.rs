// Backend collections
//
// Thin CRUD helpers over `execute`. Paths are the backend's; the variant
// names are what callers (and the CLI) use.

use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Error;
use crate::request::Request;

/// A CRUD collection exposed by the backend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Resource {
    Patients,
    Appointments,
    Results,
    Invoices,
    Studies,
    Users,
    Ledger,
    Equipment,
}

impl Resource {
    /// Collection path below the API root.
    pub fn path(self) -> &'static str {
        match self {
            Self::Patients => "/pacientes",
            Self::Appointments => "/citas",
            Self::Results => "/resultados",
            Self::Invoices => "/facturas",
            Self::Studies => "/estudios",
            Self::Users => "/admin/usuarios",
            Self::Ledger => "/contabilidad",
            Self::Equipment => "/equipos",
        }
    }

    fn item_path(self, id: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        format!("{}/{encoded}", self.path())
    }
}

impl ApiClient {
    /// List a collection, with optional query filters.
    pub async fn list(
        &self,
        resource: Resource,
        params: &[(&str, &str)],
    ) -> Result<Vec<Value>, Error> {
        let request = Request::get(resource.path()).query(params.iter().copied());
        match self.execute(&request).await? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::Parse {
                message: format!("expected a list of {resource}"),
                body: other.to_string(),
            }),
        }
    }

    pub async fn fetch(&self, resource: Resource, id: &str) -> Result<Value, Error> {
        self.execute(&Request::get(resource.item_path(id))).await
    }

    /// Create a record. Never retried.
    pub async fn create(&self, resource: Resource, body: Value) -> Result<Value, Error> {
        self.execute(&Request::post(resource.path()).json(body)).await
    }

    pub async fn update(&self, resource: Resource, id: &str, body: Value) -> Result<Value, Error> {
        self.execute(&Request::put(resource.item_path(id)).json(body)).await
    }

    pub async fn remove(&self, resource: Resource, id: &str) -> Result<Value, Error> {
        self.execute(&Request::delete(resource.item_path(id))).await
    }
}
