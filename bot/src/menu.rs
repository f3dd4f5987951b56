//! Fixed bot content: command and callback replies.

pub const WEBAPP_URL: &str = "https://pageswap.pages.dev/";
pub const STAKE_URL: &str = "https://pageswap.pages.dev/#stake";
pub const LOGO: &str = "🔄";

pub const WEBSITE_URL: &str = "https://pageswap.pages.dev";
pub const TWITTER_URL: &str = "https://twitter.com/pageswap";
pub const DISCORD_URL: &str = "https://discord.gg/pageswap";

pub const APOLOGY: &str = "Sorry, something went wrong. Please try again later.";

const WELCOME: &str = "
*Welcome to PageSwap* 🔄

Your gateway to seamless cross-chain trading and staking!

🔹 *Instant Token Swaps*
🔹 *Cross-Chain Bridge*
🔹 *High APR Staking*
🔹 *Low Transaction Fees*

Type /menu to see all available options.
";

const HELP: &str = "
*PageSwap Bot Commands* 🔄

📌 *Basic Commands*
/start - Launch the bot
/menu - Show main menu
/help - Display this help message
/stats - Show current statistics

🔧 *Trading Commands*
/price <symbol> - Check token price
/gas - Check current gas fees
/pairs - List trading pairs

💎 *Staking Commands*
/apy - View staking APY rates
/rewards - Check your rewards
/stake - Start staking

Need more help? Join our community:
";

const STAKING: &str = "
*PageSwap Staking* 🏦

Current APY Rates:
• 1 Month: 5.7% APY
• 3 Months: 8.2% APY
• 6 Months: 12.4% APY
• 12 Months: 18.7% APY

Launch the app to start staking:
";

/// One inline keyboard button, independent of the chat transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    WebApp { text: &'static str, url: &'static str },
    Callback { text: &'static str, data: &'static str },
    Link { text: &'static str, url: &'static str },
}

impl Button {
    pub fn web_app(text: &'static str, url: &'static str) -> Self {
        Button::WebApp { text, url }
    }

    pub fn callback(text: &'static str, data: &'static str) -> Self {
        Button::Callback { text, data }
    }

    pub fn link(text: &'static str, url: &'static str) -> Self {
        Button::Link { text, url }
    }
}

pub type Keyboard = Vec<Vec<Button>>;

/// Markdown message with an inline keyboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

fn formatted(text: &str) -> String {
    format!("{} {}", LOGO, text)
}

pub fn main_menu() -> Keyboard {
    vec![
        vec![
            Button::web_app("🚀 Launch App", WEBAPP_URL),
            Button::callback("💰 Trade Now", "trade"),
        ],
        vec![
            Button::callback("📊 Markets", "markets"),
            Button::callback("🏦 Stake", "stake"),
        ],
        vec![
            Button::callback("ℹ️ Help Center", "help"),
            Button::callback("📢 News", "news"),
        ],
    ]
}

fn help_reply() -> Reply {
    Reply {
        text: HELP.to_string(),
        keyboard: vec![vec![
            Button::link("🌐 Website", WEBSITE_URL),
            Button::link("🐦 Twitter", TWITTER_URL),
            Button::link("📱 Discord", DISCORD_URL),
        ]],
    }
}

pub fn command_reply(name: &str) -> Option<Reply> {
    match name {
        "start" => Some(Reply {
            text: WELCOME.to_string(),
            keyboard: main_menu(),
        }),
        "menu" => Some(Reply {
            text: formatted("*Choose an option:*"),
            keyboard: main_menu(),
        }),
        "help" => Some(help_reply()),
        _ => None,
    }
}

pub fn callback_reply(data: &str) -> Option<Reply> {
    match data {
        "trade" => Some(Reply {
            text: formatted("*Launch the app to start trading:*"),
            keyboard: vec![vec![Button::web_app("🚀 Launch PageSwap", WEBAPP_URL)]],
        }),
        "stake" => Some(Reply {
            text: formatted(STAKING),
            keyboard: vec![vec![Button::web_app("🚀 Start Staking", STAKE_URL)]],
        }),
        "help" => Some(help_reply()),
        _ => None,
    }
}
