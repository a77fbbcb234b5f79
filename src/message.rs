//! Line protocol definitions
//!
//! Everything on the wire is a newline-terminated UTF-8 text line.
//! `MenuChoice` covers the tokens a registered client may send;
//! `Notice` renders every line the server produces.

use std::fmt;

use crate::error::AppError;

/// Sentinel line ending the registration handshake
pub const REGISTRATION_COMPLETE: &str = "REGISTRATION_COMPLETE";

/// Menu shown after registration and after every action
pub const MENU: [&str; 9] = [
    "=== MENU ===",
    "1. Send a message to everyone",
    "2. Send a message to a specific person",
    "3. Send a message to multiple specific people",
    "4. Send a message to everyone except specific people",
    "5. Query the server for the list of banned phrases",
    "6. Show all connected clients",
    "Type 'exit' to disconnect",
    "Please select an option (1-6 or 'exit'):",
];

/// Client → Server menu token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// 1: message everyone
    Broadcast,
    /// 2: message one person
    DirectSingle,
    /// 3: message a comma-separated list of people
    DirectMany,
    /// 4: message everyone except a comma-separated list
    BroadcastExcluding,
    /// 5: show the banned phrases
    BannedPhrases,
    /// 6: show connected usernames
    ListUsers,
    /// Disconnect
    Exit,
}

impl MenuChoice {
    /// Parse a menu token, ignoring surrounding whitespace
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "1" => Some(Self::Broadcast),
            "2" => Some(Self::DirectSingle),
            "3" => Some(Self::DirectMany),
            "4" => Some(Self::BroadcastExcluding),
            "5" => Some(Self::BannedPhrases),
            "6" => Some(Self::ListUsers),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Server → Client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Registration prompt
    UsernamePrompt,
    /// Blank username submitted
    UsernameEmpty,
    /// Username held by another session
    UsernameTaken,
    /// Header preceding the other usernames on registration
    ConnectedClients,
    /// Header preceding all usernames for menu option 6
    AllConnectedClients,
    /// End of the registration handshake
    RegistrationComplete,
    /// Someone registered
    Joined { username: String },
    /// Someone disconnected
    Left { username: String },
    /// Broadcast chat line
    Chat { from: String, body: String },
    /// Directed chat line
    Private { from: String, body: String },
    /// Sender's message was dropped by the filter
    Blocked,
    /// A direct recipient is not registered
    RecipientNotFound { username: String },
    /// Prompt for a message body
    MessagePrompt,
    /// Prompt for a single recipient
    RecipientPrompt,
    /// Prompt for a recipient list
    RecipientsPrompt,
    /// Prompt for an exclusion list
    ExclusionsPrompt,
    /// Blank message body
    EmptyMessage,
    /// Unrecognised menu token
    InvalidOption,
    /// Menu option 5 reply
    BannedPhrases { phrases: Vec<String> },
    /// Sent to every session before a forced disconnect
    ShuttingDown,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::UsernamePrompt => f.write_str("Enter your username:"),
            Notice::UsernameEmpty => f.write_str("ERROR: Username cannot be empty."),
            Notice::UsernameTaken => f.write_str("ERROR: Username already taken."),
            Notice::ConnectedClients => f.write_str("Connected clients:"),
            Notice::AllConnectedClients => f.write_str("All connected clients:"),
            Notice::RegistrationComplete => f.write_str(REGISTRATION_COMPLETE),
            Notice::Joined { username } => write!(f, "{} has joined the chat!", username),
            Notice::Left { username } => write!(f, "{} has left the chat!", username),
            Notice::Chat { from, body } => write!(f, "{}: {}", from, body),
            Notice::Private { from, body } => write!(f, "{} (private): {}", from, body),
            Notice::Blocked => {
                f.write_str("Your message contains a banned phrase and was not delivered.")
            }
            Notice::RecipientNotFound { username } => write!(f, "User {} not found.", username),
            Notice::MessagePrompt => f.write_str("Enter your message:"),
            Notice::RecipientPrompt => f.write_str("Enter the username of the recipient:"),
            Notice::RecipientsPrompt => {
                f.write_str("Enter usernames of recipients separated by commas:")
            }
            Notice::ExclusionsPrompt => {
                f.write_str("Enter usernames of people to exclude, separated by commas:")
            }
            Notice::EmptyMessage => f.write_str("Message cannot be empty."),
            Notice::InvalidOption => {
                f.write_str("Invalid option. Please select a valid menu option.")
            }
            Notice::BannedPhrases { phrases } => {
                write!(f, "Banned phrases: {}", phrases.join(", "))
            }
            Notice::ShuttingDown => {
                f.write_str("Server is shutting down. You will be disconnected.")
            }
        }
    }
}

impl From<Notice> for String {
    fn from(notice: Notice) -> Self {
        notice.to_string()
    }
}

/// Convert a user input error into the line reported to the client
///
/// Fatal errors are handed back unchanged; they end the session instead.
impl TryFrom<AppError> for Notice {
    type Error = AppError;

    fn try_from(err: AppError) -> Result<Self, Self::Error> {
        match err {
            AppError::UsernameEmpty => Ok(Notice::UsernameEmpty),
            AppError::UsernameTaken(_) => Ok(Notice::UsernameTaken),
            AppError::ChannelSend => Err(err),
        }
    }
}
