use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{future, stream, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::state::AppState;
use crate::carousel::{Carousel, Slide};
use crate::catalog::{self, CatalogView, SearchFields, SortKey};
use crate::contact;
use crate::editor::{SpecDraft, SpecEntry};
use crate::error::AppError;
use crate::gallery::GalleryNavigator;
use crate::models::{SiteContent, Vehicle};

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub dealer: String,
    pub featured: Vec<Vehicle>,
    pub slide: Option<Slide>,
    pub count: usize,
    pub vehicles: Vec<Vehicle>,
}

/// Landing page: the featured slider's first slide plus a make/model search
pub async fn home(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HomeQuery>,
) -> Result<Json<HomePage>, AppError> {
    let all = state.shop.vehicles().await?;
    let featured = catalog::featured(&all);
    let slide = featured.first().map(|vehicle| Slide {
        index: 0,
        total: featured.len(),
        vehicle: vehicle.clone(),
    });
    let vehicles = catalog::filter(&all, &query.q, SearchFields::MakeModel);

    Ok(Json(HomePage {
        dealer: state.config.dealer_name.clone(),
        featured,
        slide,
        count: vehicles.len(),
        vehicles,
    }))
}

/// Streams the featured slider as `slide` events, one per advance.
///
/// The carousel lives inside the stream, so its timer stops as soon as the
/// client goes away and the response is dropped.
pub async fn featured_stream(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let vehicles = state.shop.vehicles().await?;
    let mut carousel = Carousel::new(state.config.carousel_interval);
    carousel.set_slides(catalog::featured(&vehicles));
    debug!("Streaming {} featured slides", carousel.len());

    let changes = carousel.subscribe();
    let events = stream::unfold(
        (carousel, changes, None::<usize>),
        |(carousel, mut changes, shown)| async move {
            if shown.is_some() {
                loop {
                    changes.changed().await.ok()?;
                    let index = *changes.borrow_and_update();
                    if Some(index) != shown {
                        break;
                    }
                }
            }

            let Some(slide) = carousel.current() else {
                // Nothing featured; hold the connection open on keep-alives
                future::pending::<()>().await;
                return None;
            };
            let index = slide.index;
            let event = Event::default().event("slide").json_data(&slide);
            Some((event, (carousel, changes, Some(index))))
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Serialize)]
pub struct InventoryPage {
    #[serde(flatten)]
    pub view: CatalogView,
    pub count: usize,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub sort: String,
}

pub async fn inventory(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<InventoryPage>, AppError> {
    let view = CatalogView::new(query.q, SortKey::parse_or_default(&query.sort));
    let vehicles = view.render(&state.shop.vehicles().await?);

    Ok(Json(InventoryPage {
        view,
        count: vehicles.len(),
        vehicles,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    pub image: Option<String>,
    pub step: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetailPage {
    pub vehicle: Vehicle,
    pub inventory_tag: String,
    pub price_label: String,
    pub gallery: GalleryNavigator,
    pub show_controls: bool,
    pub specs: Vec<SpecEntry>,
    pub contact_url: String,
}

pub async fn vehicle_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<DetailPage>, AppError> {
    let vehicle = state
        .shop
        .vehicle(&id)
        .await?
        .ok_or(AppError::NotFound("Vehicle"))?;

    let mut gallery = GalleryNavigator::for_vehicle(&vehicle);
    if let Some(image) = query.image.filter(|image| !image.is_empty()) {
        gallery.select(image);
    }
    match query.step.as_deref() {
        None | Some("") => {}
        Some("next") => gallery.next(),
        Some("prev") | Some("previous") => gallery.previous(),
        Some(other) => {
            return Err(AppError::MalformedPayload(format!("unknown gallery step '{other}'")))
        }
    }

    let contact_url = contact::whatsapp_link(
        &state.config.whatsapp_number,
        &state.config.dealer_name,
        &vehicle,
    )?;

    Ok(Json(DetailPage {
        inventory_tag: vehicle.inventory_tag(),
        price_label: format!("KES {}", contact::format_kes(vehicle.price)),
        show_controls: gallery.shows_controls(),
        specs: SpecDraft::from_specs(&vehicle.specs).entries().to_vec(),
        contact_url: contact_url.into(),
        gallery,
        vehicle,
    }))
}

pub async fn about(State(state): State<Arc<AppState>>) -> Result<Json<SiteContent>, AppError> {
    state
        .shop
        .site_content()
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Site content"))
}
