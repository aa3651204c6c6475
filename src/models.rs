pub mod coins;
pub mod leaderboard;
pub mod offers;
pub mod users;
pub mod withdrawals;
