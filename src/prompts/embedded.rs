//! Embedded default prompt templates
//!
//! Shipped in the binary so the pipeline works with no prompt files on disk.
//! A template directory can override any of these by name.

/// Intake extraction: message -> strict JSON constraints
pub const INTAKE_EXTRACT: &str = r#"You are a travel planning assistant. Extract trip information from the user's message and return JSON only, with no surrounding text.

Fields (omit any the user did not mention):
- city: destination city name (string)
- days: trip length in days (integer)
- daily_budget: budget per day (number)
- date_start: first trip day, ISO date "YYYY-MM-DD"
- pace: "relaxed" | "moderate" | "intensive"
- transport_mode: "walking" | "public_transit" | "taxi" | "driving"
- travelers_count: number of travelers (integer)
- travelers_type: "solo" | "couple" | "family" | "friends" | "elderly"
- themes: preferred themes (array of strings, e.g. ["history", "food"])
- must_visit: attraction names that must be included (array of strings)
- avoid: attraction names to exclude (array of strings)
- dietary: dietary restrictions (array of strings)

User message: {{message}}"#;

/// Intake extraction retry after a parse failure: tightened instructions
pub const INTAKE_EXTRACT_STRICT: &str = r#"Return ONLY a single JSON object. No markdown fences, no commentary, no trailing text. Unmentioned fields must be omitted entirely.

Schema: {"city": string?, "days": integer?, "daily_budget": number?, "date_start": "YYYY-MM-DD"?, "pace": string?, "transport_mode": string?, "travelers_count": integer?, "travelers_type": string?, "themes": [string]?, "must_visit": [string]?, "avoid": [string]?, "dietary": [string]?}

User message: {{message}}"#;

/// Clarify: phrase follow-up questions for missing fields
pub const CLARIFY: &str = r#"You are a friendly travel consultant. The user's request is missing required information. Ask for the missing fields below in a warm, conversational tone. Keep it under 60 words, no numbered lists.

User said: {{message}}
Missing fields: {{missing_fields}}"#;

/// Retriever fallback: generate POI candidates as JSON
pub const POI_GENERATE: &str = r#"You are a travel expert for {{city}}. List exactly {{count}} real, well-known attractions in {{city}}{{#if themes}} matching themes: {{themes}}{{/if}}.

Return a JSON array only. Each element: {"id": string, "name": string, "lat": number, "lon": number, "themes": [string], "duration_hours": number, "ticket_price": number, "indoor": boolean, "open_hours": "HH:MM-HH:MM", "description": string}"#;
