use tracing::debug;

use crate::error::Error;
use crate::models::{Cohort, CohortRankResult, User, Window};
use crate::store::CohortStats;

/// Trailing window the rank endpoint always uses.
pub const RANK_WINDOW_DAYS: i64 = 30;

/// Ranks `user` against their age-decade and gender cohort over `window`.
///
/// The four aggregates run sequentially; the first failure aborts the whole
/// computation.
pub async fn find_rank_at_age_and_gender(
    stats: &dyn CohortStats,
    user: &User,
    window: &Window,
) -> Result<CohortRankResult, Error> {
    let cohort = Cohort::of(user);

    let user_average = stats
        .user_average_score(user.id, window)
        .await
        .map_err(Error::aggregate("user average score"))?
        .unwrap_or(0.0);

    let population = stats
        .cohort_population(&cohort)
        .await
        .map_err(Error::aggregate("cohort population"))?;

    let cohort_average = stats
        .cohort_average_score(&cohort, window)
        .await
        .map_err(Error::aggregate("cohort average score"))?
        .unwrap_or(0.0);

    let rank = stats
        .count_members_above(&cohort, window, user.id, user_average)
        .await
        .map_err(Error::aggregate("members above user"))?;

    debug!(
        user_id = %user.id,
        age_floor = cohort.age_floor,
        gender = %cohort.gender,
        population,
        rank,
        "computed cohort rank"
    );

    Ok(CohortRankResult {
        user_id: user.id,
        nickname: user.nickname.clone(),
        age: user.age,
        gender: user.gender.clone(),
        normal_ratio: percentile(rank, population)?,
        average_score: format!("{user_average:.2}"),
        all_average_score: format!("{cohort_average:.2}"),
    })
}

/// Position among the cohort as a percentage: `(rank + 1) / population * 100`.
pub fn percentile(rank: i64, population: i64) -> Result<String, Error> {
    if population <= 0 {
        return Err(Error::InvalidInput("cohort has no members".to_string()));
    }
    let value = (rank + 1) as f64 / population as f64 * 100.0;
    Ok(format!("{value:.2}"))
}
