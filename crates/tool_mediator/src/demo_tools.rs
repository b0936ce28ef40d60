//! Tutorial operations backed by small in-memory data sets

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rand::seq::SliceRandom;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tool_mediator::{ParamType, ParameterSpec, Tool, ToolMediator, ToolSpec};
use tracing::debug;

/// Public placeholder API serving the user directory
pub const USER_DIRECTORY_URL: &str = "https://jsonplaceholder.typicode.com";

/// Register every demo operation
pub fn register_all(mediator: &mut ToolMediator) -> tool_mediator::Result<()> {
    register_with_user_directory(mediator, UserDirectory::new(USER_DIRECTORY_URL))
}

/// Register every demo operation, fetching users from `directory`
pub fn register_with_user_directory(
    mediator: &mut ToolMediator,
    directory: UserDirectory,
) -> tool_mediator::Result<()> {
    mediator.register_tool(AddNumbersTool)?;
    mediator.register_tool(GeneratePasswordTool)?;
    mediator.register_fn(
        ToolSpec::from_json_schema(
            "get_product_details",
            "Get the price, name, and stock information for a specific product ID",
            &json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "string",
                        "description": "The unique identifier of the product, e.g., PROD-101"
                    }
                },
                "required": ["product_id"]
            }),
        )?,
        get_product_details,
    )?;
    mediator.register_tool(ValidateEmailTool)?;

    for (name, description, lookup) in CITY_OPERATIONS {
        mediator.register_fn(city_spec(name, description), move |args| {
            Ok(lookup(string_arg(&args, "city")?))
        })?;
    }

    mediator.register_fn(
        ToolSpec::new("get_user_location", "Gets the stored location for a user by their ID")
            .param(ParameterSpec::required(
                "user_id",
                ParamType::String,
                "The unique identifier for the user",
            )),
        |args| Ok(user_location(string_arg(&args, "user_id")?)),
    )?;
    mediator.register_tool(WeatherForecastTool)?;
    mediator.register_tool(SendNotificationTool)?;

    mediator.register_tool(FetchUsersTool {
        directory: directory.clone(),
    })?;
    mediator.register_tool(UserDetailsTool { directory })?;
    mediator.register_tool(CurrentTimeTool)?;
    mediator.register_fn(
        ToolSpec::from_json_schema(
            "say_hello",
            "Returns a greeting message",
            &json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "The name to greet" }
                },
                "required": ["name"]
            }),
        )?,
        |args| Ok(json!({ "message": format!("Hello, {}!", string_arg(&args, "name")?) })),
    )?;

    Ok(())
}

fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Argument '{name}' must be a string"))
}

pub struct AddNumbersTool;

#[derive(Deserialize)]
pub struct AddNumbersInput {
    first_number: f64,
    second_number: f64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct AddNumbersOutput {
    calculation: String,
    result: f64,
}

#[async_trait]
impl Tool for AddNumbersTool {
    type Input = AddNumbersInput;
    type Output = AddNumbersOutput;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("add_numbers", "Adds two numbers together")
            .param(ParameterSpec::required(
                "first_number",
                ParamType::Number,
                "The first number to add",
            ))
            .param(ParameterSpec::required(
                "second_number",
                ParamType::Number,
                "The second number to add",
            ))
    }

    async fn execute(&self, input: AddNumbersInput) -> Result<AddNumbersOutput> {
        let result = input.first_number + input.second_number;
        Ok(AddNumbersOutput {
            calculation: format!("{} + {} = {result}", input.first_number, input.second_number),
            result,
        })
    }
}

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*";

pub struct GeneratePasswordTool;

#[derive(Deserialize)]
pub struct GeneratePasswordInput {
    length: i64,
    include_symbols: bool,
}

#[derive(Serialize, Debug)]
pub struct GeneratePasswordOutput {
    password: String,
    length: usize,
    has_symbols: bool,
    strength: &'static str,
}

#[async_trait]
impl Tool for GeneratePasswordTool {
    type Input = GeneratePasswordInput;
    type Output = GeneratePasswordOutput;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "generate_password",
            "Generates a secure password with specified length and character types",
        )
        .param(ParameterSpec::required(
            "length",
            ParamType::Integer,
            "The desired length of the password (minimum 8, maximum 128)",
        ))
        .param(ParameterSpec::required(
            "include_symbols",
            ParamType::Boolean,
            "Whether to include special symbols in the password",
        ))
    }

    async fn execute(&self, input: GeneratePasswordInput) -> Result<GeneratePasswordOutput> {
        let length = usize::try_from(input.length)
            .unwrap_or(0)
            .max(MIN_PASSWORD_LENGTH);
        if length > MAX_PASSWORD_LENGTH {
            anyhow::bail!(
                "Password length {} exceeds the maximum of {MAX_PASSWORD_LENGTH}",
                input.length
            );
        }

        let mut alphabet = ALPHANUMERIC.to_vec();
        if input.include_symbols {
            alphabet.extend_from_slice(SYMBOLS);
        }

        let mut rng = rand::thread_rng();
        let password: String = (0..length)
            .filter_map(|_| alphabet.choose(&mut rng))
            .map(|&b| b as char)
            .collect();

        Ok(GeneratePasswordOutput {
            length: password.len(),
            password,
            has_symbols: input.include_symbols,
            strength: if length >= 12 && input.include_symbols {
                "Strong"
            } else {
                "Good"
            },
        })
    }
}

fn get_product_details(args: Map<String, Value>) -> Result<Value> {
    let product_id = string_arg(&args, "product_id")?.to_uppercase();
    Ok(match product_id.as_str() {
        "PROD-101" => json!({"name": "Wireless Noise-Cancelling Headphones", "price": 249.99, "in_stock": 150}),
        "PROD-205" => json!({"name": "Smart Fitness Tracker", "price": 89.95, "in_stock": 75}),
        "PROD-315" => json!({"name": "4K Ultra HD Streaming Device", "price": 49.99, "in_stock": 0}),
        "PROD-404" => json!({"name": "Portable Bluetooth Speaker", "price": 119.00, "in_stock": 210}),
        _ => json!({"error": "Product not found"}),
    })
}

pub struct ValidateEmailTool;

#[derive(Deserialize)]
pub struct ValidateEmailInput {
    email: String,
    check_domain: bool,
}

#[derive(Serialize, Debug, Default)]
pub struct ValidateEmailOutput {
    email: String,
    is_valid: bool,
    local_part: String,
    domain: String,
    issues: Vec<String>,
    summary: String,
}

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

#[async_trait]
impl Tool for ValidateEmailTool {
    type Input = ValidateEmailInput;
    type Output = ValidateEmailOutput;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "validate_email",
            "Validates an email address and provides detailed information about its format and components",
        )
        .param(ParameterSpec::required(
            "email",
            ParamType::String,
            "The email address to validate (e.g., 'user@example.com')",
        ))
        .param(
            ParameterSpec::optional(
                "check_domain",
                ParamType::Boolean,
                "Whether to perform additional domain format checks",
            )
            .with_default(json!(true)),
        )
    }

    async fn execute(&self, input: ValidateEmailInput) -> Result<ValidateEmailOutput> {
        let email = input.email;
        let mut output = ValidateEmailOutput {
            email: email.clone(),
            ..Default::default()
        };

        if Regex::new(EMAIL_PATTERN)?.is_match(&email) {
            output.is_valid = true;
            if let Some((local_part, domain)) = email.split_once('@') {
                output.local_part = local_part.to_string();
                output.domain = domain.to_string();
            }

            if input.check_domain {
                if output.local_part.len() > 64 {
                    output.issues.push("Local part exceeds 64 characters".to_string());
                }
                if output.domain.len() > 253 {
                    output.issues.push("Domain exceeds 253 characters".to_string());
                }
                if output.domain.contains("..") {
                    output.issues.push("Domain contains consecutive dots".to_string());
                }
                output.is_valid = output.issues.is_empty();
            }
        } else {
            output.issues.push("Invalid email format".to_string());

            let domain = email.rsplit('@').next().unwrap_or_default();
            let detail = match email.matches('@').count() {
                0 => Some("Missing @ symbol"),
                1 if domain.is_empty() => Some("Missing domain"),
                1 if !domain.contains('.') => Some("Domain missing top-level domain"),
                1 => None,
                _ => Some("Multiple @ symbols"),
            };
            output.issues.extend(detail.map(str::to_string));
        }

        output.summary = if output.is_valid {
            format!("'{email}' is a valid email address")
        } else {
            format!("'{email}' is not valid: {}", output.issues.join(", "))
        };

        Ok(output)
    }
}

type CityLookup = fn(&str) -> Value;

const CITY_OPERATIONS: [(&str, &str, CityLookup); 3] = [
    (
        "get_current_temperature",
        "Gets the current temperature for a given city",
        current_temperature,
    ),
    (
        "get_time_zone",
        "Gets the time zone information for a given city",
        time_zone,
    ),
    (
        "get_population",
        "Gets the population information for a given city",
        population,
    ),
];

fn city_spec(name: &str, description: &str) -> ToolSpec {
    ToolSpec::new(name, description).param(ParameterSpec::required(
        "city",
        ParamType::String,
        "The name of the city (e.g., 'New York', 'London')",
    ))
}

fn with_city(mut value: Value, city: &str) -> Value {
    value["city"] = json!(city);
    value
}

fn current_temperature(city: &str) -> Value {
    let data = match city.to_lowercase().as_str() {
        "new york" => json!({"temp": 22, "unit": "°C", "condition": "sunny"}),
        "london" => json!({"temp": 15, "unit": "°C", "condition": "cloudy"}),
        "tokyo" => json!({"temp": 28, "unit": "°C", "condition": "humid"}),
        "paris" => json!({"temp": 18, "unit": "°C", "condition": "rainy"}),
        "sydney" => json!({"temp": 25, "unit": "°C", "condition": "clear"}),
        _ => json!({"temp": "N/A", "unit": "°C", "condition": "unknown"}),
    };
    with_city(data, city)
}

fn time_zone(city: &str) -> Value {
    let data = match city.to_lowercase().as_str() {
        "new york" => json!({"timezone": "EST (UTC-5)", "current_time": "14:30"}),
        "london" => json!({"timezone": "GMT (UTC+0)", "current_time": "19:30"}),
        "tokyo" => json!({"timezone": "JST (UTC+9)", "current_time": "04:30"}),
        "paris" => json!({"timezone": "CET (UTC+1)", "current_time": "20:30"}),
        "sydney" => json!({"timezone": "AEDT (UTC+11)", "current_time": "06:30"}),
        _ => json!({"timezone": "UTC+0", "current_time": "Unknown"}),
    };
    with_city(data, city)
}

fn population(city: &str) -> Value {
    let data = match city.to_lowercase().as_str() {
        "new york" => json!({"population": "8.3 million", "metro_area": "20.1 million"}),
        "london" => json!({"population": "9.0 million", "metro_area": "15.8 million"}),
        "tokyo" => json!({"population": "13.9 million", "metro_area": "37.4 million"}),
        "paris" => json!({"population": "2.2 million", "metro_area": "12.2 million"}),
        "sydney" => json!({"population": "5.3 million", "metro_area": "5.4 million"}),
        _ => json!({"population": "Unknown", "metro_area": "Unknown"}),
    };
    with_city(data, city)
}

fn user_location(user_id: &str) -> Value {
    let (city, state, country) = match user_id {
        "user123" => ("Seattle", "WA", "USA"),
        "user456" => ("London", "", "UK"),
        "user789" => ("Toronto", "ON", "Canada"),
        "admin001" => ("San Francisco", "CA", "USA"),
        _ => {
            return json!({
                "user_id": user_id,
                "location_found": false,
                "error": "User not found",
                "full_location": "",
            })
        }
    };

    let region = if state.is_empty() { country } else { state };
    json!({
        "user_id": user_id,
        "city": city,
        "state": state,
        "country": country,
        "location_found": true,
        "full_location": format!("{city}, {region}"),
    })
}

const MAX_FORECAST_DAYS: i64 = 7;

pub struct WeatherForecastTool;

#[derive(Deserialize)]
pub struct WeatherForecastInput {
    location: String,
    days: i64,
}

#[async_trait]
impl Tool for WeatherForecastTool {
    type Input = WeatherForecastInput;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_weather_forecast",
            "Gets the weather forecast for a specific location and number of days",
        )
        .param(ParameterSpec::required(
            "location",
            ParamType::String,
            "The location string (e.g., 'Seattle, WA' or 'London, UK')",
        ))
        .param(ParameterSpec::required(
            "days",
            ParamType::Integer,
            "Number of days to forecast (1-7)",
        ))
    }

    async fn execute(&self, input: WeatherForecastInput) -> Result<Value> {
        // (city, base temperature, condition, daily variation)
        const PATTERNS: [(&str, i64, &str, i64); 4] = [
            ("seattle", 15, "rainy", 3),
            ("london", 12, "cloudy", 2),
            ("toronto", 8, "snowy", 4),
            ("san francisco", 18, "sunny", 1),
        ];

        let location = input.location;
        let lowered = location.to_lowercase();
        let Some(&(_, base_temp, condition, variation)) =
            PATTERNS.iter().find(|(city, ..)| lowered.contains(city))
        else {
            return Ok(json!({
                "location": location,
                "error": "Weather data not available for this location",
                "forecast": [],
            }));
        };

        let forecast: Vec<Value> = (1..=input.days.min(MAX_FORECAST_DAYS))
            .map(|day| {
                let temperature = base_temp + (day % 3 - 1) * variation;
                json!({
                    "day": day,
                    "temperature": temperature,
                    "condition": condition,
                    "description": format!("Day {day}: {temperature}°C, {condition}"),
                })
            })
            .collect();

        Ok(json!({
            "location": location,
            "days_requested": input.days,
            "forecast": forecast,
            "summary": format!("{}-day forecast for {location}", input.days),
        }))
    }
}

const MAX_NOTIFICATION_LENGTH: usize = 500;

pub struct SendNotificationTool;

#[derive(Deserialize)]
pub struct SendNotificationInput {
    user_id: String,
    message: String,
}

#[async_trait]
impl Tool for SendNotificationTool {
    type Input = SendNotificationInput;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("send_notification", "Sends a notification message to a user")
            .param(ParameterSpec::required(
                "user_id",
                ParamType::String,
                "The unique identifier for the user",
            ))
            .param(ParameterSpec::required(
                "message",
                ParamType::String,
                "The notification message to send",
            ))
    }

    async fn execute(&self, input: SendNotificationInput) -> Result<Value> {
        let length = input.message.chars().count();
        if length > MAX_NOTIFICATION_LENGTH {
            anyhow::bail!("Message too long ({length} characters, max {MAX_NOTIFICATION_LENGTH})");
        }

        tracing::info!("Notification for {}: {}", input.user_id, input.message);
        Ok(json!({
            "user_id": input.user_id,
            "status": "sent",
            "message": input.message,
            "delivery_method": "push_notification",
        }))
    }
}

const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_FETCHED_USERS: i64 = 10;

/// HTTP client for a JSONPlaceholder style user directory
#[derive(Clone)]
pub struct UserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl UserDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        debug!("Fetching {url}");
        let response = self
            .client
            .get(&url)
            .timeout(DIRECTORY_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        response
            .json()
            .await
            .with_context(|| format!("Invalid response from {url}"))
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DirectoryUser {
    id: i64,
    name: String,
    username: String,
    email: String,
    phone: String,
    website: String,
    company: DirectoryCompany,
    address: DirectoryAddress,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DirectoryCompany {
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DirectoryAddress {
    street: String,
    city: String,
}

pub struct FetchUsersTool {
    directory: UserDirectory,
}

#[derive(Deserialize)]
pub struct FetchUsersInput {
    max_users: i64,
    include_email: bool,
}

#[async_trait]
impl Tool for FetchUsersTool {
    type Input = FetchUsersInput;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "fetch_users",
            "Fetches a list of users from JSONPlaceholder API with optional email inclusion",
        )
        .param(ParameterSpec::required(
            "max_users",
            ParamType::Integer,
            "Maximum number of users to fetch (1-10)",
        ))
        .param(ParameterSpec::required(
            "include_email",
            ParamType::Boolean,
            "Whether to include email addresses in the response",
        ))
    }

    // Service failures are reported to the model as an error object
    async fn execute(&self, input: FetchUsersInput) -> Result<Value> {
        let users = match self.directory.get::<Vec<DirectoryUser>>("users").await {
            Ok(users) => users,
            Err(e) => return Ok(json!({ "error": format!("Failed to fetch users: {e:#}") })),
        };

        let limit = input.max_users.clamp(0, MAX_FETCHED_USERS) as usize;
        let users: Vec<Value> = users
            .into_iter()
            .take(limit)
            .map(|user| {
                let mut entry = json!({ "id": user.id, "name": user.name });
                if input.include_email {
                    entry["email"] = json!(user.email);
                }
                entry
            })
            .collect();

        Ok(json!({
            "total_fetched": users.len(),
            "users": users,
            "emails_included": input.include_email,
        }))
    }
}

pub struct UserDetailsTool {
    directory: UserDirectory,
}

#[derive(Deserialize)]
pub struct UserDetailsInput {
    user_id: i64,
}

#[async_trait]
impl Tool for UserDetailsTool {
    type Input = UserDetailsInput;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_user_details",
            "Retrieves detailed information for a specific user by their ID",
        )
        .param(ParameterSpec::required(
            "user_id",
            ParamType::Integer,
            "The user ID to fetch details for (1-10)",
        ))
    }

    async fn execute(&self, input: UserDetailsInput) -> Result<Value> {
        let path = format!("users/{}", input.user_id);
        let user = match self.directory.get::<DirectoryUser>(&path).await {
            Ok(user) => user,
            Err(e) => {
                return Ok(json!({ "error": format!("Failed to fetch user details: {e:#}") }))
            }
        };

        Ok(json!({
            "id": user.id,
            "name": user.name,
            "username": user.username,
            "email": user.email,
            "phone": user.phone,
            "website": user.website,
            "company": user.company.name,
            "address": format!("{}, {}", user.address.street, user.address.city),
        }))
    }
}

/// Abbreviations accepted by `get_current_time` with their offset from UTC in minutes
const TIMEZONES: [(&str, i32); 16] = [
    ("UTC", 0),
    ("GMT", 0),
    ("EST", -5 * 60),
    ("EDT", -4 * 60),
    ("CST", -6 * 60),
    ("CDT", -5 * 60),
    ("MST", -7 * 60),
    ("MDT", -6 * 60),
    ("PST", -8 * 60),
    ("PDT", -7 * 60),
    ("CET", 60),
    ("CEST", 2 * 60),
    ("IST", 5 * 60 + 30),
    ("JST", 9 * 60),
    ("AEST", 10 * 60),
    ("AEDT", 11 * 60),
];

pub struct CurrentTimeTool;

#[derive(Deserialize)]
pub struct CurrentTimeInput {
    timezone: String,
}

#[async_trait]
impl Tool for CurrentTimeTool {
    type Input = CurrentTimeInput;
    type Output = Value;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "get_current_time",
            "Gets the current time in a specified timezone",
        )
        .param(ParameterSpec::required(
            "timezone",
            ParamType::String,
            "Timezone (e.g., 'UTC', 'EST', 'PST')",
        ))
    }

    async fn execute(&self, input: CurrentTimeInput) -> Result<Value> {
        time_in_zone(&input.timezone, Utc::now())
    }
}

fn time_in_zone(timezone: &str, now: DateTime<Utc>) -> Result<Value> {
    let abbreviation = timezone.trim().to_uppercase();
    let offset = TIMEZONES
        .iter()
        .find(|(name, _)| *name == abbreviation)
        .and_then(|&(_, minutes)| FixedOffset::east_opt(minutes * 60))
        .with_context(|| format!("Unknown timezone '{timezone}'"))?;

    let local = now.with_timezone(&offset);
    Ok(json!({
        "timezone": abbreviation,
        "utc_offset": offset.to_string(),
        "current_time": local.format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}
