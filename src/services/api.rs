use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::models::{
    CreateInvoiceInput, Invoice, LoginCredentials, PaginatedInvoiceResponse, RegisterCredentials,
    UpdateInvoiceInput, User,
};
use crate::services::credentials::CredentialProvider;
use crate::services::poller::InvoiceFetcher;

const INVOICE_FIELDS: &str = "id name filePath createdAt date type";

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct InvoicesData {
    invoices: PaginatedInvoiceResponse,
}

#[derive(Deserialize)]
struct InvoiceQueryData {
    invoice: Option<Invoice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    create_invoice: Invoice,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateData {
    update_invoice: Invoice,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveData {
    remove_invoice: Value,
}

#[derive(Deserialize)]
struct RestErrorBody {
    message: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    graphql_url: String,
    rest_base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(
        graphql_url: &str,
        rest_base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(ApiClient {
            http,
            graphql_url: graphql_url.to_string(),
            rest_base_url: rest_base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/{}", self.rest_base_url, path.trim_start_matches('/'))
    }

    pub async fn list_invoices(&self, page: u32, limit: u32) -> Result<PaginatedInvoiceResponse, ApiError> {
        let data: InvoicesData = self
            .graphql(&list_invoices_query(), json!({ "page": page, "limit": limit }))
            .await?;
        Ok(data.invoices)
    }

    pub async fn get_invoice(&self, id: i64) -> Result<Invoice, ApiError> {
        let data: InvoiceQueryData = self.graphql(&get_invoice_query(), json!({ "id": id })).await?;
        data.invoice.ok_or(ApiError::MissingData("invoice"))
    }

    pub async fn create_invoice(&self, input: &CreateInvoiceInput) -> Result<Invoice, ApiError> {
        let query = format!(
            "mutation CreateInvoice($createInvoiceInput: CreateInvoiceInput!) {{ createInvoice(createInvoiceInput: $createInvoiceInput) {{ {} }} }}",
            INVOICE_FIELDS
        );
        let data: CreateData = self
            .graphql(&query, json!({ "createInvoiceInput": input }))
            .await?;
        Ok(data.create_invoice)
    }

    pub async fn update_invoice(&self, input: &UpdateInvoiceInput) -> Result<Invoice, ApiError> {
        let query = format!(
            "mutation UpdateInvoice($updateInvoiceInput: UpdateInvoiceInput!) {{ updateInvoice(updateInvoiceInput: $updateInvoiceInput) {{ {} }} }}",
            INVOICE_FIELDS
        );
        let data: UpdateData = self
            .graphql(&query, json!({ "updateInvoiceInput": input }))
            .await?;
        Ok(data.update_invoice)
    }

    pub async fn delete_invoice(&self, id: i64) -> Result<bool, ApiError> {
        let query = "mutation RemoveInvoice($id: Int!) { removeInvoice(id: $id) }";
        let data: RemoveData = self.graphql(query, json!({ "id": id })).await?;
        Ok(!matches!(data.remove_invoice, Value::Null | Value::Bool(false)))
    }

    pub async fn create_invoice_with_file(
        &self,
        file: &Path,
        input: &CreateInvoiceInput,
    ) -> Result<Invoice, ApiError> {
        let form = upload_form(file, input).await?;
        let request = self.http.post(self.rest_url("invoices")).multipart(form);
        self.send_rest(request).await
    }

    pub async fn update_invoice_with_file(
        &self,
        id: i64,
        file: &Path,
        input: &CreateInvoiceInput,
    ) -> Result<Invoice, ApiError> {
        let form = upload_form(file, input).await?;
        let request = self
            .http
            .put(self.rest_url(&format!("invoices/{}", id)))
            .multipart(form);
        self.send_rest(request).await
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, ApiError> {
        let request = self.http.post(self.rest_url("login")).json(credentials);
        self.send_rest(request).await
    }

    pub async fn register(&self, credentials: &RegisterCredentials) -> Result<User, ApiError> {
        let request = self.http.post(self.rest_url("register")).json(credentials);
        self.send_rest(request).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let request = self.http.post(self.rest_url("logout"));
        let response = self.authorize(request).send().await?;
        check_status(response).await.map(|_| ())
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, ApiError> {
        let body = GraphqlRequest { query, variables };
        let request = self.http.post(&self.graphql_url).json(&body);
        let response = check_status(self.authorize(request).send().await?).await?;
        let envelope: GraphqlResponse<T> = response.json().await?;
        unwrap_graphql(envelope)
    }

    async fn send_rest<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let response = check_status(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl InvoiceFetcher for ApiClient {
    async fn fetch_invoice(&self, id: i64) -> Result<Invoice, ApiError> {
        self.get_invoice(id).await
    }
}

fn list_invoices_query() -> String {
    format!(
        "query GetInvoices($page: Int = 1, $limit: Int = 10) {{ invoices(page: $page, limit: $limit) {{ invoices {{ {} invoiceData {{ id content amount }} }} total page limit totalPages }} }}",
        INVOICE_FIELDS
    )
}

fn get_invoice_query() -> String {
    format!(
        "query GetInvoice($id: Int!) {{ invoice(id: $id) {{ {} invoiceData {{ id content amount }} }} }}",
        INVOICE_FIELDS
    )
}

fn unwrap_graphql<T>(envelope: GraphqlResponse<T>) -> Result<T, ApiError> {
    if let Some(first) = envelope.errors.into_iter().next() {
        return Err(ApiError::Graphql(first.message));
    }
    envelope.data.ok_or(ApiError::MissingData("data"))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(rest_error(status.as_u16(), &body))
}

fn rest_error(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<RestErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "empty response".to_string()
            } else {
                body.trim().to_string()
            }
        });
    ApiError::Rest { status, message }
}

async fn upload_form(file: &Path, input: &CreateInvoiceInput) -> Result<Form, ApiError> {
    let bytes = tokio::fs::read(file).await?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "invoice".to_string());
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for(file))?;

    let mut form = Form::new()
        .part("file", part)
        .text("name", input.name.clone())
        .text("date", input.date.to_rfc3339_opts(SecondsFormat::Millis, true))
        .text("type", input.kind.as_str());

    if let Some(tag_ids) = input.tag_ids.as_ref().filter(|ids| !ids.is_empty()) {
        form = form.text("tagIds", serde_json::to_string(tag_ids).unwrap_or_default());
    }
    Ok(form)
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}
