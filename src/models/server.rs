pub mod referrals;
