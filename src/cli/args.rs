use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "salahscore", version, author, about = "Score your prayers and nudge your friends, from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write location, calculation method and identity to the config file
    Setup {
        /// Your user id for social commands
        #[arg(long)]
        user: Option<String>,
        /// Name shown next to your id (empty string clears it)
        #[arg(long)]
        name: Option<String>,
        /// Location label shown in `times`
        #[arg(long)]
        location: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Calculation method, e.g. MuslimWorldLeague, Karachi, UmmAlQura
        #[arg(long)]
        method: Option<String>,
        /// Hanafi or Shafi
        #[arg(long)]
        madhab: Option<String>,
        /// UTC offset: "5", "+5:30", "-4"
        #[arg(long, allow_hyphen_values = true)]
        tz: Option<String>,
    },
    /// Show today's prayer windows, their status, and the next prayer
    Times,
    /// Register a prayer and score it
    Register {
        /// Prayer name (fajr, dhuhr, asr, maghrib, isha)
        prayer: String,
        /// Prayed in congregation at a mosque
        #[arg(long)]
        mosque: bool,
        /// Time you prayed (HH:MM, most recent occurrence); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Show daily averages and streak
    Stats {
        /// Show the last 7 days
        #[arg(long)]
        week: bool,
    },
    /// Missed prayers that still need to be made up
    Missed {
        #[command(subcommand)]
        action: MissedCommands,
    },
    /// Status visibility and reminder permissions
    Privacy {
        #[command(subcommand)]
        action: PrivacyCommands,
    },
    /// Manage friends
    Friend {
        #[command(subcommand)]
        action: FriendCommands,
    },
    /// Send a prayer reminder to a friend
    Remind {
        /// Receiver's user id
        user: String,
        /// Prayer name
        prayer: String,
        /// Optional message
        #[arg(long)]
        message: Option<String>,
    },
    /// Friends who have not registered a prayer today
    Pending {
        /// Prayer name
        prayer: String,
    },
    /// Reminders you have received
    Inbox {
        #[arg(long, default_value_t = crate::social::reminders::DEFAULT_INBOX_LIMIT)]
        limit: u32,
    },
    /// Mark a received reminder as read
    Read {
        /// Reminder id
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum MissedCommands {
    /// List missed prayers
    List,
    /// Mark a missed prayer as made up
    Makeup {
        /// Record id from `missed list`
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrivacyCommands {
    /// Show your current settings
    Show,
    /// Who can see your prayer status: everyone, friends, none
    Visibility { level: String },
    /// Who can send you reminders: everyone, friends, none
    Reminders { level: String },
    /// Always accept reminders from this user
    Allow { user: String },
    /// Never accept reminders from this user
    Block { user: String },
    /// Remove a user from both exception lists
    Unlist { user: String },
    /// Turn your own outgoing reminders on or off
    Sending {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// Turn a notification on or off
    Notify {
        #[arg(value_parser = ["on", "off"])]
        state: String,
        /// Which notification to change
        #[arg(
            long,
            default_value = "friend-reminders",
            value_parser = ["friend-reminders", "missed-prayers", "upcoming-prayers", "daily-summary"]
        )]
        kind: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum FriendCommands {
    /// Send a friend request
    Add { user: String },
    /// Accept a pending request
    Accept { user: String },
    /// Remove a friend or cancel a request
    Remove { user: String },
    /// List friends and incoming requests
    List,
}
