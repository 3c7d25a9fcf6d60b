mod helpers;

mod callbacks;
mod checkout;
