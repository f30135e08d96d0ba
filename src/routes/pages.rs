// Server-rendered pages: search form, result table with report, margin calculator

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use serde::Deserialize;

use super::SearchForm;
use crate::{
    config::{Locale, Settings},
    error::{AppError, SearchError},
    export::{created_label, ExportFormat},
    models::{Condition, Listing},
    normalize::{display_sold, format_count, format_money, format_price},
    ranking::{RankOutcome, SortMode},
    report::{margins, CostTargets, KeywordCount, MarginResult},
    search::SearchOutcome,
    AppState,
};

const DEFAULT_QUERY: &str = "lâmpada LED";

struct SortOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

struct FormView {
    query: String,
    limit: u32,
    max_limit: u32,
    sort_options: Vec<SortOption>,
    new_only: bool,
}

impl FormView {
    fn new(form: &SearchForm, settings: &Settings) -> Self {
        Self {
            query: form.query.clone(),
            limit: form.limit.unwrap_or(settings.search.default_limit),
            max_limit: settings.search.max_limit,
            sort_options: SortMode::all()
                .into_iter()
                .map(|mode| SortOption {
                    value: mode.as_str(),
                    label: mode.label(),
                    selected: mode == form.sort,
                })
                .collect(),
            new_only: form.new_only(),
        }
    }
}

#[derive(Default)]
struct MarginFormView {
    sale_price: String,
    cost_price: String,
}

struct RowView {
    position: usize,
    title: String,
    price: String,
    sold: String,
    sold_label: String,
    used: bool,
    free_shipping: bool,
    fulfillment: bool,
    created: String,
    created_failed: bool,
    permalink: String,
    thumbnail: String,
}

impl RowView {
    fn new(position: usize, listing: &Listing, locale: &Locale) -> Self {
        Self {
            position,
            title: listing.title.clone(),
            price: format_price(listing.price, locale),
            sold: format_count(listing.sold, locale),
            sold_label: display_sold(&listing.raw_sold, locale),
            used: listing.condition == Condition::Used,
            free_shipping: listing.free_shipping,
            fulfillment: listing.fulfillment,
            created: created_label(&listing.created, locale),
            created_failed: listing.created.is_failed(),
            permalink: listing.permalink.clone(),
            thumbnail: listing.thumbnail.clone().unwrap_or_default(),
        }
    }
}

struct TargetView {
    markup: String,
    max_cost: String,
}

struct MarginView {
    marketplace: String,
    commission: String,
    total_cost: String,
    gross_profit: String,
    margin_pct: String,
}

impl MarginView {
    fn new(result: &MarginResult, locale: &Locale) -> Self {
        Self {
            marketplace: result.marketplace.clone(),
            commission: format_money(result.commission, locale),
            total_cost: format_money(result.total_cost, locale),
            gross_profit: format_money(result.gross_profit, locale),
            margin_pct: percent(result.margin_pct, locale),
        }
    }
}

fn percent(value: f64, locale: &Locale) -> String {
    format!("{:.2}%", value).replace('.', &locale.decimal_separator.to_string())
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    form: FormView,
    margin: MarginFormView,
}

#[derive(Template)]
#[template(path = "results.html")]
struct ResultsTemplate {
    form: FormView,
    margin: MarginFormView,
    error: String,
    access_denied: bool,
    no_matches: bool,
    from_cache: bool,
    fetched: usize,
    rows: Vec<RowView>,
    sample_size: usize,
    keywords: Vec<KeywordCount>,
    mean_price: String,
    targets: Vec<TargetView>,
    currency: String,
    xlsx_query: String,
    csv_query: String,
}

impl ResultsTemplate {
    fn empty(form: &SearchForm, settings: &Settings) -> Self {
        Self {
            form: FormView::new(form, settings),
            margin: MarginFormView::default(),
            error: String::new(),
            access_denied: false,
            no_matches: false,
            from_cache: false,
            fetched: 0,
            rows: Vec::new(),
            sample_size: 0,
            keywords: Vec::new(),
            mean_price: String::new(),
            targets: Vec::new(),
            currency: settings.locale.currency_symbol.clone(),
            xlsx_query: form.export_query(ExportFormat::Xlsx),
            csv_query: form.export_query(ExportFormat::Csv),
        }
    }

    fn fill(&mut self, outcome: &SearchOutcome, locale: &Locale) {
        self.from_cache = outcome.from_cache;
        self.fetched = outcome.fetched;
        self.no_matches = outcome.ranked == RankOutcome::NoMatches;
        self.rows = outcome
            .rows()
            .iter()
            .enumerate()
            .map(|(i, listing)| RowView::new(i + 1, listing, locale))
            .collect();

        if let Some(report) = &outcome.report {
            self.sample_size = report.sample_size;
            self.keywords = report.keywords.clone();
            if let CostTargets::Available { mean_price, targets } = &report.cost_targets {
                self.mean_price = format_price(Some(*mean_price), locale);
                self.targets = targets
                    .iter()
                    .map(|t| TargetView {
                        markup: format!("{:.0}%", t.markup * 100.0),
                        max_cost: format_price(Some(t.max_cost), locale),
                    })
                    .collect();
            }
        }
    }
}

#[derive(Template)]
#[template(path = "margin.html")]
struct MarginTemplate {
    form: FormView,
    margin: MarginFormView,
    error: String,
    unprofitable: bool,
    /// Sale price covers the cost but fees eat the spread on some marketplace.
    loss_after_fees: bool,
    results: Vec<MarginView>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MarginQuery {
    sale_price: Option<String>,
    cost_price: Option<String>,
}

fn parse_amount(value: Option<&str>) -> Option<f64> {
    let value = value?.trim().replace(',', ".");
    value.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render template: {}", e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}

pub async fn index_page(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let form = SearchForm {
        query: DEFAULT_QUERY.to_string(),
        sort: SortMode::BestSelling,
        ..SearchForm::default()
    };
    render(&IndexTemplate {
        form: FormView::new(&form, &app_state.settings),
        margin: MarginFormView::default(),
    })
}

pub async fn results_page(
    State(app_state): State<AppState>,
    Query(form): Query<SearchForm>,
) -> Result<impl IntoResponse, AppError> {
    let settings = &app_state.settings;
    let mut template = ResultsTemplate::empty(&form, settings);

    let status = match app_state.search.search(&form.params()).await {
        Ok(outcome) => {
            template.fill(&outcome, &settings.locale);
            StatusCode::OK
        }
        Err(SearchError::Fetch(e)) => {
            tracing::warn!(error = %e, "Search failed");
            template.access_denied = e.is_access_denied();
            template.error = e.to_string();
            if template.access_denied {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::BAD_GATEWAY
            }
        }
        Err(e) => {
            template.error = e.to_string();
            StatusCode::BAD_REQUEST
        }
    };

    Ok((status, render(&template)?))
}

pub async fn margin_page(
    State(app_state): State<AppState>,
    Query(query): Query<MarginQuery>,
) -> Result<impl IntoResponse, AppError> {
    let settings = &app_state.settings;
    let form = SearchForm {
        query: DEFAULT_QUERY.to_string(),
        sort: SortMode::BestSelling,
        ..SearchForm::default()
    };
    let mut template = MarginTemplate {
        form: FormView::new(&form, settings),
        margin: MarginFormView {
            sale_price: query.sale_price.clone().unwrap_or_default(),
            cost_price: query.cost_price.clone().unwrap_or_default(),
        },
        error: String::new(),
        unprofitable: false,
        loss_after_fees: false,
        results: Vec::new(),
    };

    match (parse_amount(query.sale_price.as_deref()), parse_amount(query.cost_price.as_deref())) {
        (Some(sale_price), Some(cost_price)) => {
            let results = margins(sale_price, cost_price, &settings.fees);
            template.unprofitable = sale_price <= cost_price;
            template.loss_after_fees = results.iter().any(|r| r.gross_profit < 0.0);
            template.results = results.iter().map(|r| MarginView::new(r, &settings.locale)).collect();
        }
        _ if query.sale_price.is_some() || query.cost_price.is_some() => {
            template.error = "Enter a sale price and a cost price.".to_string();
        }
        _ => {}
    }

    render(&template)
}
