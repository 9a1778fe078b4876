//! Prompt templates for period summaries and narrative merges.

/// Sent in place of an empty cumulative narrative.
pub const NO_PREVIOUS_HISTORY: &str = "No previous history available.";

pub const OVERALL_START: &str = "[OVERALL_START]";
pub const OVERALL_END: &str = "[OVERALL_END]";
pub const CHANGE_START: &str = "[CHANGE_START]";
pub const CHANGE_END: &str = "[CHANGE_END]";

/// A narrative produced from one window of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodSlot {
    /// Agent performance over the trailing window.
    AgentMonthly,
    /// City operations for the local calendar day.
    CityDailyOps,
    /// City operations over the trailing window.
    CityMonthly,
    /// City-wide coaching focus. Regenerated monthly.
    CityCoaching,
}

impl PeriodSlot {
    pub fn label(&self) -> &'static str {
        match self {
            PeriodSlot::AgentMonthly => "agent_monthly",
            PeriodSlot::CityDailyOps => "city_daily_ops",
            PeriodSlot::CityMonthly => "city_monthly",
            PeriodSlot::CityCoaching => "city_coaching",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            PeriodSlot::AgentMonthly => "You are a QA Supervisor for a Call Center.",
            PeriodSlot::CityDailyOps => "You are a City Operations Manager.",
            PeriodSlot::CityMonthly => "You are a Regional Operations Director.",
            PeriodSlot::CityCoaching => "You are a Training & Quality Lead.",
        }
    }

    pub fn max_tokens(&self) -> i32 {
        match self {
            PeriodSlot::AgentMonthly => 1000,
            _ => 1200,
        }
    }

    /// Render the user prompt for `subject` (agent or city name) over the
    /// already-capped corpus lines.
    pub fn render(&self, subject: &str, corpus: &str) -> String {
        match self {
            PeriodSlot::AgentMonthly => format!(
                "Analyze the following call logs for agent '{subject}' for this month.\n\n\
                 Call Logs:\n{corpus}\n\n\
                 Task:\n\
                 Generate a detailed monthly performance insight (100 words or less).\n\
                 Focus on:\n\
                 1. Key strengths demonstrated.\n\
                 2. Recurring issues or weaknesses.\n\
                 3. Overall sentiment and customer satisfaction trends.\n\
                 4. Compliance with protocols.\n\n\
                 Return ONLY the insight text. Do NOT include word counts like \"(150 words)\" at the end. Do NOT use markdown."
            ),
            PeriodSlot::CityDailyOps => format!(
                "Analyze the following operational business insights from today's calls in {subject}.\n\n\
                 Data:\n{corpus}\n\n\
                 Task:\n\
                 Generate a 'Daily Ops Insight' (100 words or less).\n\
                 - Identify any immediate operational bottlenecks, surged issues, or patterns today.\n\
                 - Be specific.\n\
                 - Do NOT include word counts.\n\
                 - Do NOT use markdown formatting. Return plain text only."
            ),
            PeriodSlot::CityMonthly => format!(
                "Analyze the business insights for {subject} from the last 30 days.\n\n\
                 Data:\n{corpus}\n\n\
                 Task:\n\
                 Generate a 'Latest Month Insight' (100 words or less).\n\
                 - Summarize key operational trends, recurring business problems, and volume drivers.\n\
                 - Highlight macro-level issues affecting the city.\n\
                 - Do NOT include word counts.\n\
                 - Do NOT use markdown formatting. Return plain text only."
            ),
            PeriodSlot::CityCoaching => format!(
                "Analyze the individual coaching insights for agents in {subject} over the last month.\n\n\
                 Coaching Logs:\n{corpus}\n\n\
                 Task:\n\
                 Generate a 'Coaching Focus for City' (100 words or less).\n\
                 - Identify common skill gaps across agents in this city (e.g., empathy, process knowledge, closing).\n\
                 - Recommend specific training modules or focus areas for the city team.\n\
                 - Do NOT include word counts.\n\
                 - Do NOT use markdown formatting. Return plain text only."
            ),
        }
    }
}

/// Whose cumulative narrative a merge updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeSubject {
    Agent,
    City,
}

impl MergeSubject {
    pub fn label(&self) -> &'static str {
        match self {
            MergeSubject::Agent => "agent_merge",
            MergeSubject::City => "city_merge",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            MergeSubject::Agent => "You are a helpful assistant.",
            MergeSubject::City => "You are a helpful analyst.",
        }
    }

    pub fn max_tokens(&self) -> i32 {
        match self {
            MergeSubject::Agent => 1000,
            MergeSubject::City => 1200,
        }
    }

    pub fn render(&self, previous: &str, period: &str) -> String {
        let (role, guidance) = match self {
            MergeSubject::Agent => (
                "You are updating the long-term profile of a call center agent.",
                "- If the new month confirms old trends, reinforce them.\n\
                 - If the new month shows a change (improvement or decline), reflect this evolution \
                 (e.g., \"Previously struggled with X, but recently showed improvement...\").",
            ),
            MergeSubject::City => (
                "You are maintaining the long-term operational profile of a city.",
                "- Merge new findings with historical context.\n\
                 - Reinforce persistent trends or note if long-standing issues are resolving.",
            ),
        };

        format!(
            "{role}\n\n\
             Current Overall Insight (Up to last month):\n\"{previous}\"\n\n\
             New Monthly Insight (This month's performance):\n\"{period}\"\n\n\
             Task:\n\
             1. Create an UPDATED Overall Insight that integrates the new month's findings into the historical context.\n\
             {guidance}\n\
             - Keep it concise (100 words or less). Do NOT include word counts like \"(150 words)\" at the end. Do NOT use markdown.\n\n\
             2. Generate a 'Latest Change Summary' (50 words or less).\n\
             - Specifically highlight what changed THIS month compared to the past.\n\
             - Call out distinct improvements or declines.\n\
             - Do NOT include word counts.\n\
             - Do NOT use markdown.\n\n\
             Output Format:\n\
             Please use the following exact format with separators:\n\n\
             {OVERALL_START}\n...updated overall text here...\n{OVERALL_END}\n\n\
             {CHANGE_START}\n...change summary here...\n{CHANGE_END}"
        )
    }
}
