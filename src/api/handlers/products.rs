use std::str::FromStr;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{state::AppState, uploads},
    domain::{CreateProductRequest, Product, UpdateProductRequest},
    error::{AppError, Result},
};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state.service_context.catalog_service.list().await?;
    Ok(Json(products))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>> {
    let product = state.service_context.catalog_service.get(id).await?;
    Ok(Json(product))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.service_context.catalog_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// An `image` file part plus the remaining text parts of a product form.
struct ProductForm {
    fields: Vec<(String, String)>,
    image: Option<(String, Vec<u8>)>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut fields = Vec::new();
        let mut image = None;

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                // Browsers send an empty part when no file is picked
                if !filename.is_empty() || !data.is_empty() {
                    image = Some((filename, data.to_vec()));
                }
            } else {
                let value = field.text().await.map_err(bad_multipart)?;
                fields.push((name, value));
            }
        }

        Ok(Self { fields, image })
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.text(name)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", name, value)))
            })
            .transpose()
    }

    fn into_request(&self, image_url: Option<String>) -> Result<CreateProductRequest> {
        Ok(CreateProductRequest {
            name: self.text("name").unwrap_or_default(),
            price: self
                .parsed::<Decimal>("price")?
                .ok_or_else(|| AppError::BadRequest("Price is required".to_string()))?,
            description: self.text("description"),
            category: self.text("category"),
            image_url,
            quantity: self.parsed("quantity")?,
            total_stock: self.parsed("totalStock")?,
        })
    }
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}

/// Creates a product from a `multipart/form-data` form with an optional `image` file.
pub async fn create_with_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>)> {
    let form = ProductForm::read(multipart).await?;
    // Reject bad fields before anything touches the disk
    form.into_request(None)?;

    let uploads_dir = &state.settings.server.uploads_dir;
    let image_url = match &form.image {
        Some((filename, data)) => Some(uploads::save_image(uploads_dir, filename, data).await?),
        None => None,
    };

    let created = state.service_context.catalog_service
        .create(form.into_request(image_url.clone())?)
        .await;

    match created {
        Ok(product) => Ok((StatusCode::CREATED, Json(product))),
        Err(e) => {
            if let Some(url) = image_url {
                discard_image(uploads_dir, &url).await;
            }
            Err(e)
        }
    }
}

/// Replaces a product's image with the uploaded `image` file.
pub async fn set_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Product>> {
    let catalog = &state.service_context.catalog_service;
    let existing = catalog.get(id).await?;

    let form = ProductForm::read(multipart).await?;
    let (filename, data) = form
        .image
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("An image file is required".to_string()))?;

    let uploads_dir = &state.settings.server.uploads_dir;
    let image_url = uploads::save_image(uploads_dir, filename, data).await?;

    let update = UpdateProductRequest {
        image_url: Some(image_url.clone()),
        ..Default::default()
    };
    match catalog.update(id, update).await {
        Ok(product) => {
            discard_image(uploads_dir, &existing.image_url).await;
            Ok(Json(product))
        }
        Err(e) => {
            discard_image(uploads_dir, &image_url).await;
            Err(e)
        }
    }
}

async fn discard_image(uploads_dir: &str, image_url: &str) {
    if let Err(e) = uploads::delete_image(uploads_dir, image_url).await {
        tracing::warn!("Could not remove image {}: {}", image_url, e);
    }
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>> {
    let product = state.service_context.catalog_service.update(id, req).await?;
    Ok(Json(product))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let catalog = &state.service_context.catalog_service;
    let product = catalog.get(id).await?;
    catalog.delete(id).await?;
    discard_image(&state.settings.server.uploads_dir, &product.image_url).await;

    Ok(Json(json!({ "message": "Product deleted" })))
}
